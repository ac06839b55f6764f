//! Per-source relation vocabularies and the strength model
//!
//! Every source speaks its own relation dialect. This is the only place those
//! dialects are decoded into [`RelationType`].

use crate::models::{Evidence, RelationType, SourceKind};

/// Role keywords that mean "played an instrument on it"
const INSTRUMENTS: &[&str] = &[
    "vocals", "voice", "guitar", "bass", "drums", "percussion", "piano", "keyboards",
    "synthesizer", "organ", "saxophone", "sax", "trumpet", "trombone", "flute", "clarinet",
    "violin", "viola", "cello", "harp", "horn", "tuba", "harmonica", "banjo", "mandolin",
    "accordion", "vibraphone", "marimba", "congas", "bongos", "tabla", "sitar", "oboe",
    "bassoon", "strings", "brass", "turntables", "performer", "musician", "programmed",
];

/// Lowercase, drop `[...]` qualifiers, collapse whitespace
///
/// `"Tenor Saxophone [Solo]"` becomes `"tenor saxophone"`.
pub fn normalize_label(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut depth = 0usize;

    for c in label.chars() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.extend(c.to_lowercase()),
            _ => {}
        }
    }

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decode a source label; `None` means the label has no mapping and is skipped
pub fn map_label(source: SourceKind, label: &str) -> Option<RelationType> {
    let label = normalize_label(label);
    if label.is_empty() {
        return match source {
            SourceKind::Ai => Some(RelationType::Influence),
            _ => None,
        };
    }

    match source {
        SourceKind::Discography | SourceKind::Credits => credit_role(&label),
        SourceKind::Registry => registry_relation(&label),
        SourceKind::Encyclopedia => encyclopedia_relation(&label),
        SourceKind::Ai => Some(ai_relation(&label)),
    }
}

fn credit_role(label: &str) -> Option<RelationType> {
    let has = |needle: &str| label.contains(needle);

    if has("remix") {
        Some(RelationType::Remix)
    } else if has("featuring") || has("feat") {
        Some(RelationType::Featured)
    } else if has("producer") || has("produced") {
        Some(RelationType::Producer)
    } else if ["written", "composed", "composer", "music by", "lyrics", "songwriter", "arranged"]
        .iter()
        .any(|k| has(k))
    {
        Some(RelationType::Composer)
    } else if ["engineer", "recorded by", "mixed", "mastered", "recording"]
        .iter()
        .any(|k| has(k))
    {
        Some(RelationType::Engineer)
    } else if has("member") {
        Some(RelationType::GroupMember)
    } else if has("label mate") {
        Some(RelationType::LabelMate)
    } else if has("collaborat") {
        Some(RelationType::Collaboration)
    } else if label
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| INSTRUMENTS.contains(&word))
    {
        Some(RelationType::Musician)
    } else {
        None
    }
}

fn registry_relation(label: &str) -> Option<RelationType> {
    match label {
        "member of band" | "founder" => Some(RelationType::GroupMember),
        "collaboration" => Some(RelationType::Collaboration),
        "supporting musician" | "vocal supporting musician" | "instrumental supporting musician" => {
            Some(RelationType::Musician)
        }
        "producer" => Some(RelationType::Producer),
        "subgroup" => Some(RelationType::SideProject),
        "teacher" | "tribute" | "named after" => Some(RelationType::Influence),
        "remixer" => Some(RelationType::Remix),
        _ => None,
    }
}

fn encyclopedia_relation(label: &str) -> Option<RelationType> {
    match label {
        "influence" | "influenced" => Some(RelationType::Influence),
        "producer" => Some(RelationType::Producer),
        "member" => Some(RelationType::GroupMember),
        "featured" => Some(RelationType::Featured),
        "remix" => Some(RelationType::Remix),
        "collaboration" => Some(RelationType::Collaboration),
        "side project" => Some(RelationType::SideProject),
        "label mate" => Some(RelationType::LabelMate),
        _ => None,
    }
}

/// AI labels are free text; anything outside the closed set is an influence
fn ai_relation(label: &str) -> RelationType {
    label
        .replace([' ', '-'], "_")
        .parse()
        .unwrap_or(RelationType::Influence)
}

/// Strength (0-10) for a piece of evidence of the given decoded type
pub fn strength(evidence: &Evidence, relation_type: RelationType) -> u8 {
    match evidence.source {
        SourceKind::Registry => 7,
        SourceKind::Encyclopedia => 5,
        SourceKind::Discography | SourceKind::Credits => match relation_type {
            RelationType::Musician => 6,
            RelationType::Producer => 7,
            RelationType::Composer => 8,
            RelationType::Engineer => 4,
            _ => 6,
        },
        SourceKind::Ai => ai_strength(evidence.strength_hint),
    }
}

fn ai_strength(hint: Option<f64>) -> u8 {
    let score = match hint {
        Some(h) if h.is_finite() && h > 1.0 => h,
        Some(h) if h.is_finite() => h * 10.0,
        _ => 0.0,
    };
    score.round().clamp(0.0, 10.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_label_strips_qualifiers() {
        assert_eq!(normalize_label("Tenor Saxophone [Solo]"), "tenor saxophone");
        assert_eq!(normalize_label("  Producer  "), "producer");
        assert_eq!(normalize_label("[Uncredited]"), "");
    }

    #[test]
    fn test_discography_roles() {
        let d = SourceKind::Discography;
        assert_eq!(map_label(d, "Producer"), Some(RelationType::Producer));
        assert_eq!(map_label(d, "Co-producer"), Some(RelationType::Producer));
        assert_eq!(map_label(d, "Written-By"), Some(RelationType::Composer));
        assert_eq!(map_label(d, "Mixed By"), Some(RelationType::Engineer));
        assert_eq!(map_label(d, "Drums [Kit]"), Some(RelationType::Musician));
        assert_eq!(map_label(d, "Tenor Saxophone"), Some(RelationType::Musician));
        assert_eq!(map_label(d, "Remix"), Some(RelationType::Remix));
        assert_eq!(map_label(d, "Featuring"), Some(RelationType::Featured));
        assert_eq!(map_label(d, "member"), Some(RelationType::GroupMember));
        assert_eq!(map_label(d, "Artwork"), None);
        assert_eq!(map_label(d, "Photography By"), None);
    }

    #[test]
    fn test_credits_share_discography_table() {
        assert_eq!(map_label(SourceKind::Credits, "Piano"), Some(RelationType::Musician));
        assert_eq!(map_label(SourceKind::Credits, "Mastered By"), Some(RelationType::Engineer));
    }

    #[test]
    fn test_registry_relations() {
        let r = SourceKind::Registry;
        assert_eq!(map_label(r, "member of band"), Some(RelationType::GroupMember));
        assert_eq!(map_label(r, "Subgroup"), Some(RelationType::SideProject));
        assert_eq!(map_label(r, "teacher"), Some(RelationType::Influence));
        assert_eq!(map_label(r, "is person"), None);
    }

    #[test]
    fn test_ai_labels_fall_back_to_influence() {
        let a = SourceKind::Ai;
        assert_eq!(map_label(a, "collaboration"), Some(RelationType::Collaboration));
        assert_eq!(map_label(a, "Side Project"), Some(RelationType::SideProject));
        assert_eq!(map_label(a, "similar"), Some(RelationType::Influence));
        assert_eq!(map_label(a, ""), Some(RelationType::Influence));
    }

    #[test]
    fn test_strength_model() {
        let disc = Evidence::new(SourceKind::Discography, "A", "B", "Producer");
        assert_eq!(strength(&disc, RelationType::Producer), 7);
        assert_eq!(strength(&disc, RelationType::Composer), 8);
        assert_eq!(strength(&disc, RelationType::Engineer), 4);
        assert_eq!(strength(&disc, RelationType::Musician), 6);
        assert_eq!(strength(&disc, RelationType::GroupMember), 6);

        let reg = Evidence::new(SourceKind::Registry, "A", "B", "producer");
        assert_eq!(strength(&reg, RelationType::Producer), 7);

        let enc = Evidence::new(SourceKind::Encyclopedia, "A", "B", "influence");
        assert_eq!(strength(&enc, RelationType::Influence), 5);
    }

    #[test]
    fn test_ai_strength_scales() {
        let ai = |hint| Evidence::new(SourceKind::Ai, "A", "B", "similar").with_strength_hint(hint);
        assert_eq!(strength(&ai(0.87), RelationType::Influence), 9);
        assert_eq!(strength(&ai(0.04), RelationType::Influence), 0);
        assert_eq!(strength(&ai(7.0), RelationType::Influence), 7);
        assert_eq!(strength(&ai(42.0), RelationType::Influence), 10);
        assert_eq!(strength(&ai(-1.0), RelationType::Influence), 0);
        assert_eq!(
            strength(&Evidence::new(SourceKind::Ai, "A", "B", "x"), RelationType::Influence),
            0
        );
    }
}
