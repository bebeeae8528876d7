/*!
    Parsers for the quick-add line and for date, time and tag input.

    A quick-add line looks like `[2025-03-31 14:30] Buy milk #errand !high`:
    an optional deadline tag, then title words mixed with `#tags` and an
    optional `!priority`.
!*/
use std::collections::BTreeSet;

use chrono::NaiveDate;
use chrono::NaiveTime;
use winnow::Parser;
use winnow::Result;
use winnow::ascii::multispace0;
use winnow::ascii::space0;
use winnow::ascii::space1;
use winnow::combinator::delimited;
use winnow::combinator::opt;
use winnow::combinator::preceded;
use winnow::error::ContextError;
use winnow::token::one_of;
use winnow::token::rest;
use winnow::token::take_while;

use crate::tasklet::{self, Deadline, Priority, normalize_tag};

#[derive(Debug, PartialEq)]
pub struct QuickTask {
    pub title: String,
    pub deadline: Option<Deadline>,
    pub tags: BTreeSet<String>,
    pub priority: Option<Priority>,
}

/// Parses a whole quick-add line. A line starting with `[` must carry a
/// valid deadline tag; a bad date reports `InvalidDate`, a valid date with
/// a bad time reports `InvalidTime`.
pub fn parse_quick_line(line: &str) -> Result<QuickTask, tasklet::Error> {
    let mut input = line;
    parse_quick_task
        .parse_next(&mut input)
        .map_err(|_| deadline_tag_error(bracketed(line)))
}

pub fn parse_date_input(input: &str) -> Result<NaiveDate, tasklet::Error> {
    parse_date
        .parse(input.trim())
        .map_err(|_| tasklet::Error::InvalidDate(input.to_string()))
}

pub fn parse_time_input(input: &str) -> Result<NaiveTime, tasklet::Error> {
    parse_time
        .parse(input.trim())
        .map_err(|_| tasklet::Error::InvalidTime(input.to_string()))
}

/// Splits a comma-joined tag string into normalized tags.
pub fn parse_tag_list(input: &str) -> BTreeSet<String> {
    input.split(',').filter_map(normalize_tag).collect()
}

fn deadline_tag_error(tag: &str) -> tasklet::Error {
    let inner = tag.trim_start_matches('[').trim_end_matches(']');
    let mut parts = inner.split_whitespace();
    let date_ok = parts.next().is_some_and(|date| parse_date_input(date).is_ok());
    match parts.next() {
        Some(time) if date_ok && parse_time_input(time).is_err() => {
            tasklet::Error::InvalidTime(time.to_string())
        }
        _ => tasklet::Error::InvalidDate(tag.to_string()),
    }
}

fn bracketed(line: &str) -> &str {
    let line = line.trim_start();
    match line.find(']') {
        Some(end) => &line[..=end],
        None => line,
    }
}

fn parse_quick_task(input: &mut &str) -> Result<QuickTask> {
    multispace0::<_, ContextError>.parse_next(input)?;
    let deadline = if input.starts_with('[') {
        Some(parse_deadline_tag.parse_next(input)?)
    } else {
        None
    };
    let remainder = rest::<_, ContextError>.parse_next(input)?;

    let mut words = vec![];
    let mut tags = BTreeSet::new();
    let mut priority = None;
    for word in remainder.split_whitespace() {
        if word.len() > 1 && word.starts_with('#') {
            tags.extend(parse_tag_list(word));
            continue;
        }
        if let Some(level) = word.strip_prefix('!') {
            if let Ok(level) = level.parse::<Priority>() {
                priority = Some(level);
                continue;
            }
        }
        words.push(word);
    }

    Ok(QuickTask {
        title: words.join(" "),
        deadline,
        tags,
        priority,
    })
}

fn parse_deadline_tag(input: &mut &str) -> Result<Deadline> {
    delimited(
        ('[', space0),
        (parse_date, opt(preceded(space1, parse_time))),
        (space0, ']'),
    )
    .map(|(date, time)| Deadline::new(date, time))
    .parse_next(input)
}

fn parse_date(input: &mut &str) -> Result<NaiveDate> {
    (
        parse_year,
        parse_separator,
        parse_number,
        parse_separator,
        parse_number,
    )
        .verify_map(|(year, _, month, _, day)| NaiveDate::from_ymd_opt(year, month, day))
        .parse_next(input)
}

fn parse_time(input: &mut &str) -> Result<NaiveTime> {
    (parse_number, ':', parse_number)
        .verify_map(|(hour, _, minute)| NaiveTime::from_hms_opt(hour, minute, 0))
        .parse_next(input)
}

fn parse_year(input: &mut &str) -> Result<i32> {
    take_while(4, '0'..='9')
        .try_map(|digits: &str| digits.parse::<i32>())
        .parse_next(input)
}

fn parse_number(input: &mut &str) -> Result<u32> {
    take_while(1..=2, '0'..='9')
        .try_map(|digits: &str| digits.parse::<u32>())
        .parse_next(input)
}

fn parse_separator(input: &mut &str) -> Result<char> {
    one_of(['-', '/']).parse_next(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn simple_year_test() {
        let mut input = "2034-";
        assert_eq!(parse_year(&mut input).unwrap(), 2034);
        assert_eq!(input, "-");
    }

    #[test]
    fn simple_date_test() {
        let mut input = "2025-03-01";
        assert_eq!(parse_date(&mut input).unwrap(), date(2025, 3, 1));

        let mut input = "2025/3/1";
        assert_eq!(parse_date(&mut input).unwrap(), date(2025, 3, 1));
    }

    #[test]
    fn impossible_dates_are_rejected() {
        assert!(parse_date_input("2025-02-30").is_err());
        assert!(parse_date_input("25-02-01").is_err());
        assert!(parse_date_input("2025-02-01 junk").is_err());
    }

    #[test]
    fn time_input() {
        assert_eq!(
            parse_time_input("09:05").unwrap(),
            NaiveTime::from_hms_opt(9, 5, 0).unwrap()
        );
        assert_eq!(
            parse_time_input("9:30").unwrap(),
            NaiveTime::from_hms_opt(9, 30, 0).unwrap()
        );
        assert!(matches!(
            parse_time_input("24:00"),
            Err(tasklet::Error::InvalidTime(_))
        ));
        assert!(parse_time_input("12").is_err());
    }

    #[test]
    fn simple_parse_test() {
        let input = r#"

            [2025-03-31]
            This is a test task.
            "#;

        let task = parse_quick_line(input).unwrap();
        assert_eq!(task.title, "This is a test task.");
        assert_eq!(task.deadline, Some(Deadline::new(date(2025, 3, 31), None)));
        assert!(task.tags.is_empty());
        assert_eq!(task.priority, None);
    }

    #[test]
    fn quick_line_with_time_tags_and_priority() {
        let task = parse_quick_line("[2025-03-31 14:30] Buy milk #Errand #home !high").unwrap();
        assert_eq!(task.title, "Buy milk");
        assert_eq!(
            task.deadline,
            Some(Deadline::new(
                date(2025, 3, 31),
                NaiveTime::from_hms_opt(14, 30, 0)
            ))
        );
        assert_eq!(
            task.tags.into_iter().collect::<Vec<_>>(),
            vec!["errand".to_string(), "home".to_string()]
        );
        assert_eq!(task.priority, Some(Priority::High));
    }

    #[test]
    fn quick_line_without_deadline() {
        let task = parse_quick_line("Call mom !soon #").unwrap();
        assert_eq!(task.title, "Call mom !soon #");
        assert_eq!(task.deadline, None);
    }

    #[test]
    fn bad_deadline_tag_is_an_error() {
        match parse_quick_line("[2025-13-01] Broken") {
            Err(tasklet::Error::InvalidDate(text)) => assert_eq!(text, "[2025-13-01]"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bad_time_in_deadline_tag_is_a_time_error() {
        match parse_quick_line("[2025-03-31 25:00] Late") {
            Err(tasklet::Error::InvalidTime(text)) => assert_eq!(text, "25:00"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            parse_quick_line("[2025-03-31 9:75] Late"),
            Err(tasklet::Error::InvalidTime(_))
        ));
        assert!(matches!(
            parse_quick_line("[2025-02-30 09:00] Never"),
            Err(tasklet::Error::InvalidDate(_))
        ));
    }

    #[test]
    fn comma_joined_hashtag_yields_separate_tags() {
        let task = parse_quick_line("Buy paint #red,blue").unwrap();
        assert_eq!(task.title, "Buy paint");
        assert_eq!(
            task.tags.into_iter().collect::<Vec<_>>(),
            vec!["blue".to_string(), "red".to_string()]
        );
    }

    #[test]
    fn tag_list_is_split_on_commas() {
        let tags = parse_tag_list("art, #Chart,,  art ");
        assert_eq!(
            tags.into_iter().collect::<Vec<_>>(),
            vec!["art".to_string(), "chart".to_string()]
        );
    }
}
