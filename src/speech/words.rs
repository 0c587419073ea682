//! Spoken forms of durations, e.g. `90` -> "one minute thirty seconds".

fn number_word(n: u32) -> Option<&'static str> {
    const ONES: [&str; 21] = [
        "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
        "eleven", "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen",
        "eighteen", "nineteen", "twenty",
    ];
    match n {
        0..=20 => Some(ONES[n as usize]),
        30 => Some("thirty"),
        40 => Some("forty"),
        50 => Some("fifty"),
        _ => None,
    }
}

/// Numbers without a word fall back to digits.
fn quantity(n: u32, singular: &str, plural: &str) -> String {
    let unit = if n == 1 { singular } else { plural };
    match number_word(n) {
        Some(word) => format!("{word} {unit}"),
        None => format!("{n} {unit}"),
    }
}

pub fn spoken_duration(secs: u32) -> String {
    let minutes = secs / 60;
    let seconds = secs % 60;

    match (minutes, seconds) {
        (0, s) => quantity(s, "second", "seconds"),
        (m, 0) => quantity(m, "minute", "minutes"),
        (m, s) => format!(
            "{} {}",
            quantity(m, "minute", "minutes"),
            quantity(s, "second", "seconds")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minutes_and_seconds() {
        assert_eq!(spoken_duration(90), "one minute thirty seconds");
        assert_eq!(spoken_duration(150), "two minutes thirty seconds");
    }

    #[test]
    fn whole_minutes_drop_the_seconds() {
        assert_eq!(spoken_duration(60), "one minute");
        assert_eq!(spoken_duration(300), "five minutes");
        assert_eq!(spoken_duration(20 * 60), "twenty minutes");
    }

    #[test]
    fn singular_and_plural_seconds() {
        assert_eq!(spoken_duration(1), "one second");
        assert_eq!(spoken_duration(2), "two seconds");
    }

    #[test]
    fn unsupported_numbers_fall_back_to_digits() {
        assert_eq!(spoken_duration(25), "25 seconds");
        assert_eq!(spoken_duration(28 * 60), "28 minutes");
        assert_eq!(spoken_duration(85), "one minute 25 seconds");
    }
}
