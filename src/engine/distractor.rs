use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use crate::models::Flashcard;

pub const OPTION_COUNT: usize = 4;
const DISTRACTOR_COUNT: usize = OPTION_COUNT - 1;

/// Answer options for one forced-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChoiceSet {
    pub options: Vec<String>,
    pub correct_index: usize,
}

impl ChoiceSet {
    #[cfg(test)]
    pub fn correct_answer(&self) -> &str {
        &self.options[self.correct_index]
    }

    pub fn is_correct(&self, index: usize) -> bool {
        index == self.correct_index
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }
}

/// Builds the option set for `current`, drawing distractors from the back
/// content of every other card.
///
/// Distractors are distinct and never equal to the correct answer. When
/// fewer than three such values exist the set simply has fewer options;
/// a deck of one card yields a single option.
pub fn generate<R: Rng + ?Sized>(
    current: &Flashcard,
    all_cards: &[Flashcard],
    rng: &mut R,
) -> ChoiceSet {
    let correct = current.back_content.as_str();

    let mut seen = HashSet::new();
    let mut pool: Vec<&str> = all_cards
        .iter()
        .filter(|c| c.id != current.id)
        .map(|c| c.back_content.as_str())
        .filter(|value| *value != correct && seen.insert(*value))
        .collect();

    let take = pool.len().min(DISTRACTOR_COUNT);
    let (picked, _) = pool.partial_shuffle(rng, take);

    let mut options: Vec<String> = picked.iter().map(|s| s.to_string()).collect();
    options.shuffle(rng);

    // Uniform insertion point over a shuffled list is a uniform shuffle of the whole set
    let correct_index = rng.gen_range(0..=options.len());
    options.insert(correct_index, correct.to_string());

    ChoiceSet {
        options,
        correct_index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn card(id: i64, back: &str) -> Flashcard {
        Flashcard {
            id,
            front_content: format!("front {}", id),
            back_content: back.to_string(),
            times_reviewed: 0,
            times_correct: 0,
            last_reviewed_at: None,
            difficulty_level: None,
            created_at: "2026-01-01T00:00:00+00:00".to_string(),
        }
    }

    fn deck(size: i64) -> Vec<Flashcard> {
        (1..=size).map(|i| card(i, &format!("answer {}", i))).collect()
    }

    #[test]
    fn full_deck_yields_four_options() {
        let cards = deck(10);
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let set = generate(&cards[3], &cards, &mut rng);
            assert_eq!(set.len(), OPTION_COUNT);
            assert_eq!(set.options[set.correct_index], cards[3].back_content);
        }
    }

    #[test]
    fn options_are_distinct() {
        let cards = deck(6);
        for seed in 0..100 {
            let mut rng = StdRng::seed_from_u64(seed);
            let set = generate(&cards[0], &cards, &mut rng);
            let unique: HashSet<&String> = set.options.iter().collect();
            assert_eq!(unique.len(), set.len());
        }
    }

    #[test]
    fn exactly_three_other_cards_uses_all_of_them() {
        let cards = deck(4);
        let mut rng = StdRng::seed_from_u64(7);
        let set = generate(&cards[1], &cards, &mut rng);

        let mut sorted = set.options.clone();
        sorted.sort();
        assert_eq!(
            sorted,
            vec!["answer 1", "answer 2", "answer 3", "answer 4"]
        );
    }

    #[test]
    fn small_pool_reduces_option_count() {
        let cards = deck(3);
        let mut rng = StdRng::seed_from_u64(1);
        let set = generate(&cards[0], &cards, &mut rng);
        assert_eq!(set.len(), 3);
        assert_eq!(set.correct_answer(), "answer 1");
    }

    #[test]
    fn single_card_deck_yields_single_option() {
        let cards = deck(1);
        let mut rng = StdRng::seed_from_u64(1);
        let set = generate(&cards[0], &cards, &mut rng);
        assert_eq!(set.options, vec!["answer 1".to_string()]);
        assert_eq!(set.correct_index, 0);
    }

    #[test]
    fn duplicate_back_content_is_not_a_distractor() {
        let cards = vec![
            card(1, "same"),
            card(2, "same"),
            card(3, "other"),
            card(4, "other"),
        ];
        let mut rng = StdRng::seed_from_u64(3);
        let set = generate(&cards[0], &cards, &mut rng);

        assert_eq!(set.len(), 2);
        assert_eq!(set.correct_answer(), "same");
        assert!(set.options.contains(&"other".to_string()));
    }

    #[test]
    fn current_card_missing_from_pool_still_works() {
        let cards = deck(5);
        let stranger = card(99, "elsewhere");
        let mut rng = StdRng::seed_from_u64(11);
        let set = generate(&stranger, &cards, &mut rng);
        assert_eq!(set.len(), OPTION_COUNT);
        assert_eq!(set.correct_answer(), "elsewhere");
    }

    #[test]
    fn correct_index_is_roughly_uniform() {
        let cards = deck(8);
        let mut rng = StdRng::seed_from_u64(2024);
        let mut buckets = [0usize; OPTION_COUNT];
        for _ in 0..4000 {
            let set = generate(&cards[0], &cards, &mut rng);
            buckets[set.correct_index] += 1;
        }
        for count in buckets {
            assert!(count > 800 && count < 1200, "skewed buckets: {:?}", buckets);
        }
    }

    #[test]
    fn every_distractor_is_sampled() {
        let cards = deck(8);
        let mut rng = StdRng::seed_from_u64(99);
        let mut seen = HashSet::new();
        for _ in 0..500 {
            let set = generate(&cards[0], &cards, &mut rng);
            seen.extend(set.options);
        }
        assert_eq!(seen.len(), 8);
    }

    #[test]
    fn is_correct_matches_index() {
        let cards = deck(5);
        let mut rng = StdRng::seed_from_u64(5);
        let set = generate(&cards[2], &cards, &mut rng);
        for i in 0..set.len() {
            assert_eq!(set.is_correct(i), i == set.correct_index);
        }
    }
}
