use crate::items::repo::{Category, Condition};

const BASE_POINTS: i32 = 20;

/// Point value of a listing, derived from condition and category alone.
/// Always recomputed server-side at creation; a client-supplied value is
/// never trusted.
pub fn points_value(condition: Condition, category: Category) -> i32 {
    let condition_bonus = match condition {
        Condition::LikeNew => 15,
        Condition::Excellent => 10,
        Condition::Good => 5,
        Condition::Fair => 0,
    };
    let category_bonus = match category {
        Category::Outerwear | Category::Shoes => 10,
        _ => 0,
    };
    BASE_POINTS + condition_bonus + category_bonus
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_new_outerwear_scores_45() {
        assert_eq!(points_value(Condition::LikeNew, Category::Outerwear), 45);
    }

    #[test]
    fn fair_tops_scores_base_only() {
        assert_eq!(points_value(Condition::Fair, Category::Tops), 20);
    }

    #[test]
    fn full_table() {
        let conditions = [
            (Condition::LikeNew, 15),
            (Condition::Excellent, 10),
            (Condition::Good, 5),
            (Condition::Fair, 0),
        ];
        let categories = [
            (Category::Tops, 0),
            (Category::Bottoms, 0),
            (Category::Dresses, 0),
            (Category::Outerwear, 10),
            (Category::Shoes, 10),
            (Category::Accessories, 0),
            (Category::Activewear, 0),
            (Category::Formal, 0),
        ];
        for (condition, cond_bonus) in conditions {
            for (category, cat_bonus) in categories {
                assert_eq!(
                    points_value(condition, category),
                    20 + cond_bonus + cat_bonus,
                    "{condition:?} / {category:?}"
                );
            }
        }
    }
}
