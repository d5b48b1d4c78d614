use time::Date;

use crate::users::repo_types::Profile;

const SAME_CITY: i16 = 30;
const COMPLETENESS_SHARE: i16 = 30;

/// 0..=100 score for a matched pair, `None` when neither city nor age can be compared.
pub fn compatibility(a: &Profile, b: &Profile, today: Date) -> Option<i16> {
    let same_city = match (city(a), city(b)) {
        (Some(x), Some(y)) => Some(x.eq_ignore_ascii_case(y)),
        _ => None,
    };
    let age_gap = match (a.age_on(today), b.age_on(today)) {
        (Some(x), Some(y)) => Some((x - y).abs()),
        _ => None,
    };
    if same_city.is_none() && age_gap.is_none() {
        return None;
    }

    let mut score = 0;
    if same_city == Some(true) {
        score += SAME_CITY;
    }
    score += match age_gap {
        Some(0..=3) => 40,
        Some(4..=6) => 25,
        Some(7..=10) => 10,
        _ => 0,
    };
    let mean_completeness = (i16::from(a.completeness) + i16::from(b.completeness)) / 2;
    score += mean_completeness * COMPLETENESS_SHARE / 100;
    Some(score.min(100))
}

fn city(p: &Profile) -> Option<&str> {
    p.city.as_deref().map(str::trim).filter(|c| !c.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn profile(city: Option<&str>, dob: Option<Date>, completeness: u8) -> Profile {
        Profile {
            city: city.map(Into::into),
            date_of_birth: dob,
            completeness,
            ..Default::default()
        }
    }

    const TODAY: Date = date!(2025 - 05 - 01);

    #[test]
    fn nothing_comparable_gives_none() {
        let a = profile(None, None, 80);
        let b = profile(Some("Mumbai"), None, 80);
        assert_eq!(compatibility(&a, &b, TODAY), None);
    }

    #[test]
    fn ideal_pair_scores_hundred() {
        let a = profile(Some("Mumbai"), Some(date!(1995 - 01 - 01)), 100);
        let b = profile(Some("mumbai "), Some(date!(1996 - 06 - 01)), 100);
        assert_eq!(compatibility(&a, &b, TODAY), Some(100));
    }

    #[test]
    fn age_gap_bands() {
        let a = profile(None, Some(date!(1990 - 01 - 01)), 0);
        let near = profile(None, Some(date!(1995 - 01 - 01)), 0);
        let mid = profile(None, Some(date!(1999 - 01 - 01)), 0);
        let far = profile(None, Some(date!(2003 - 01 - 01)), 0);
        assert_eq!(compatibility(&a, &near, TODAY), Some(25));
        assert_eq!(compatibility(&a, &mid, TODAY), Some(10));
        assert_eq!(compatibility(&a, &far, TODAY), Some(0));
    }

    #[test]
    fn different_cities_only_count_completeness() {
        let a = profile(Some("Pune"), None, 60);
        let b = profile(Some("Delhi"), None, 40);
        assert_eq!(compatibility(&a, &b, TODAY), Some(15));
    }
}
