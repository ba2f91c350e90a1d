use rcp_types::{Ingredient, RecipeContent, RecipeHash, RecipeStep};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

/// Canonical SHA-256 fingerprint of recipe content.
///
/// The canonical form is compact JSON with every key written in
/// alphabetical order, so the byte stream is identical whether or not
/// `serde_json` preserves insertion order. Before serialization:
///
/// - absent text becomes `""` and absent numbers become `0`
/// - every text value is NFC-normalized
/// - tags are sorted and deduplicated
///
/// The hasher holds no state; it is safe to call from any number of tasks.
pub struct CanonicalHasher;

impl CanonicalHasher {
    /// Hash recipe content into its canonical fingerprint.
    pub fn hash(content: &RecipeContent) -> RecipeHash {
        let digest = Sha256::digest(Self::canonical_bytes(content));
        RecipeHash::from_digest(digest.into())
    }

    /// The exact UTF-8 bytes that [`Self::hash`] digests.
    pub fn canonical_bytes(content: &RecipeContent) -> Vec<u8> {
        Self::canonical_value(content).to_string().into_bytes()
    }

    /// Returns `true` if `content` still hashes to `expected`.
    pub fn verify(content: &RecipeContent, expected: &RecipeHash) -> bool {
        Self::hash(content) == *expected
    }

    fn canonical_value(content: &RecipeContent) -> Value {
        let mut tags: Vec<String> = content.tags.iter().map(|t| nfc(t)).collect();
        tags.sort();
        tags.dedup();

        json!({
            "category": text(&content.category),
            "content": text(&content.content),
            "cookTime": number(content.cook_time),
            "ingredients": content.ingredients.iter().map(ingredient).collect::<Vec<_>>(),
            "prepTime": number(content.prep_time),
            "servings": number(content.servings),
            "steps": content.steps.iter().map(step).collect::<Vec<_>>(),
            "summary": text(&content.summary),
            "tags": tags,
            "title": text(&content.title),
        })
    }
}

fn ingredient(i: &Ingredient) -> Value {
    json!({
        "amount": text(&i.amount),
        "name": text(&i.name),
        "notes": text(&i.notes),
        "unit": text(&i.unit),
    })
}

fn step(s: &RecipeStep) -> Value {
    json!({
        "description": text(&s.description),
        "duration": number(s.duration),
        "order": number(s.order),
        "temperature": text(&s.temperature),
        "title": text(&s.title),
    })
}

fn text(value: &Option<String>) -> String {
    value.as_deref().map(nfc).unwrap_or_default()
}

fn number(value: Option<u32>) -> u32 {
    value.unwrap_or(0)
}

fn nfc(s: &str) -> String {
    s.nfc().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pho(tags: &[&str]) -> RecipeContent {
        RecipeContent::titled("Phở Bò")
            .with_ingredient(Ingredient::named("Beef"))
            .with_tags(tags.iter().copied())
    }

    #[test]
    fn hash_is_deterministic() {
        let content = pho(&["soup"]);
        assert_eq!(CanonicalHasher::hash(&content), CanonicalHasher::hash(&content.clone()));
    }

    #[test]
    fn tag_order_does_not_matter() {
        let a = CanonicalHasher::hash(&pho(&["soup", "beef"]));
        let b = CanonicalHasher::hash(&pho(&["beef", "soup"]));
        assert_eq!(a, b);
        assert_eq!(a.to_hex().len(), 64);
        assert!(a.to_hex().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn duplicate_tags_collapse() {
        let a = CanonicalHasher::hash(&pho(&["soup", "beef", "soup"]));
        let b = CanonicalHasher::hash(&pho(&["beef", "soup"]));
        assert_eq!(a, b);
    }

    #[test]
    fn canonical_text_is_pinned() {
        let content = RecipeContent::titled("Tea").with_tags(["b", "a"]);
        let text = String::from_utf8(CanonicalHasher::canonical_bytes(&content)).unwrap();
        assert_eq!(
            text,
            r#"{"category":"","content":"","cookTime":0,"ingredients":[],"prepTime":0,"servings":0,"steps":[],"summary":"","tags":["a","b"],"title":"Tea"}"#
        );
    }

    #[test]
    fn absent_and_empty_fields_hash_alike() {
        let absent = RecipeContent::titled("Tea");
        let empty = RecipeContent {
            summary: Some(String::new()),
            servings: Some(0),
            ..RecipeContent::titled("Tea")
        };
        assert_eq!(CanonicalHasher::hash(&absent), CanonicalHasher::hash(&empty));
    }

    #[test]
    fn nfc_equivalent_titles_hash_alike() {
        // "ở" precomposed vs. "o" + combining horn + combining hook above.
        let composed = RecipeContent::titled("Ph\u{1edf}");
        let decomposed = RecipeContent::titled("Pho\u{31b}\u{309}");
        assert_ne!(composed.title, decomposed.title);
        assert_eq!(CanonicalHasher::hash(&composed), CanonicalHasher::hash(&decomposed));
    }

    #[test]
    fn every_content_field_changes_the_hash() {
        let base = RecipeContent {
            title: Some("Phở Bò".into()),
            summary: Some("Hanoi style".into()),
            content: Some("Long simmered broth".into()),
            ingredients: vec![Ingredient {
                name: Some("Beef".into()),
                amount: Some("500".into()),
                unit: Some("g".into()),
                notes: Some("brisket".into()),
            }],
            steps: vec![RecipeStep {
                order: Some(1),
                title: Some("Broth".into()),
                description: Some("Simmer bones".into()),
                duration: Some(360),
                temperature: Some("95°C".into()),
            }],
            tags: vec!["soup".into()],
            category: Some("Vietnamese".into()),
            prep_time: Some(30),
            cook_time: Some(360),
            servings: Some(4),
        };
        let h0 = CanonicalHasher::hash(&base);

        let mutations: Vec<Box<dyn Fn(&mut RecipeContent)>> = vec![
            Box::new(|c| c.title = Some("Phở Gà".into())),
            Box::new(|c| c.summary = Some("Saigon style".into())),
            Box::new(|c| c.content = None),
            Box::new(|c| c.ingredients[0].name = Some("Chicken".into())),
            Box::new(|c| c.ingredients[0].amount = Some("400".into())),
            Box::new(|c| c.ingredients[0].unit = Some("kg".into())),
            Box::new(|c| c.ingredients[0].notes = None),
            Box::new(|c| c.ingredients.push(Ingredient::named("Star anise"))),
            Box::new(|c| c.steps[0].order = Some(2)),
            Box::new(|c| c.steps[0].title = None),
            Box::new(|c| c.steps[0].description = Some("Boil bones".into())),
            Box::new(|c| c.steps[0].duration = Some(300)),
            Box::new(|c| c.steps[0].temperature = Some("100°C".into())),
            Box::new(|c| c.tags.push("beef".into())),
            Box::new(|c| c.category = Some("Asian".into())),
            Box::new(|c| c.prep_time = Some(20)),
            Box::new(|c| c.cook_time = Some(240)),
            Box::new(|c| c.servings = Some(6)),
        ];

        for (i, mutate) in mutations.iter().enumerate() {
            let mut changed = base.clone();
            mutate(&mut changed);
            assert_ne!(CanonicalHasher::hash(&changed), h0, "mutation {i} left the hash unchanged");
        }
    }

    #[test]
    fn ingredient_order_matters() {
        let a = RecipeContent::titled("Soup")
            .with_ingredient(Ingredient::named("Salt"))
            .with_ingredient(Ingredient::named("Water"));
        let b = RecipeContent::titled("Soup")
            .with_ingredient(Ingredient::named("Water"))
            .with_ingredient(Ingredient::named("Salt"));
        assert_ne!(CanonicalHasher::hash(&a), CanonicalHasher::hash(&b));
    }

    #[test]
    fn verify_detects_tampering() {
        let content = pho(&["soup"]);
        let hash = CanonicalHasher::hash(&content);
        assert!(CanonicalHasher::verify(&content, &hash));
        let tampered = RecipeContent {
            servings: Some(99),
            ..content
        };
        assert!(!CanonicalHasher::verify(&tampered, &hash));
    }

    proptest! {
        #[test]
        fn tag_permutations_hash_alike(mut tags in proptest::collection::vec("[a-z]{1,8}", 0..8), seed in any::<u64>()) {
            let original = RecipeContent::titled("Any").with_tags(tags.clone());
            // Deterministic shuffle driven by the seed.
            let len = tags.len();
            if len > 1 {
                for i in 0..len {
                    let j = ((seed.wrapping_mul(i as u64 + 1)) % len as u64) as usize;
                    tags.swap(i, j);
                }
            }
            let shuffled = RecipeContent::titled("Any").with_tags(tags);
            prop_assert_eq!(CanonicalHasher::hash(&original), CanonicalHasher::hash(&shuffled));
        }

        #[test]
        fn distinct_titles_hash_differently(a in ".{0,24}", b in ".{0,24}") {
            let na: String = a.nfc().collect();
            let nb: String = b.nfc().collect();
            prop_assume!(na != nb);
            prop_assert_ne!(
                CanonicalHasher::hash(&RecipeContent::titled(a)),
                CanonicalHasher::hash(&RecipeContent::titled(b))
            );
        }
    }
}
