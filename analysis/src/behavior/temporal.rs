use super::{dominant, rate, BehaviorContext, BehaviorPattern, BehaviorType};
use crate::stats::mean;
use chrono::{Datelike, Timelike, Weekday};
use std::collections::{BTreeMap, BTreeSet};

const WEEKEND_SHARE: f64 = 0.5;
const BINGE_MINUTES: f64 = 60.0;
const FREQUENT_SESSIONS_PER_DAY: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Daypart {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl Daypart {
    const ALL: [Daypart; 4] = [
        Daypart::Morning,
        Daypart::Afternoon,
        Daypart::Evening,
        Daypart::Night,
    ];

    fn of_hour(hour: u32) -> Self {
        match hour {
            5..=11 => Daypart::Morning,
            12..=16 => Daypart::Afternoon,
            17..=21 => Daypart::Evening,
            _ => Daypart::Night,
        }
    }

    fn slug(&self) -> &'static str {
        match self {
            Daypart::Morning => "morning",
            Daypart::Afternoon => "afternoon",
            Daypart::Evening => "evening",
            Daypart::Night => "night",
        }
    }
}

pub(super) fn analyze(ctx: &BehaviorContext) -> Vec<BehaviorPattern> {
    let mut by_daypart: Vec<(Daypart, Vec<String>)> =
        Daypart::ALL.iter().map(|part| (*part, Vec::new())).collect();
    let mut weekend = Vec::new();
    let mut bingers = Vec::new();
    let mut frequent = Vec::new();
    let mut session_minutes = Vec::new();
    let mut by_hour: BTreeMap<u32, Vec<String>> = BTreeMap::new();
    let mut by_weekday: BTreeMap<u32, (Weekday, Vec<String>)> = BTreeMap::new();

    for activity in &ctx.activity {
        let parts = activity
            .interactions
            .iter()
            .map(|record| Daypart::of_hour(record.timestamp.hour()));
        if let Some((part, _, _)) = dominant(parts) {
            if let Some((_, users)) = by_daypart.iter_mut().find(|(p, _)| *p == part) {
                users.push(activity.user_id.clone());
            }
        }

        let hours = activity.interactions.iter().map(|r| r.timestamp.hour());
        if let Some((hour, _, _)) = dominant(hours) {
            by_hour.entry(hour).or_default().push(activity.user_id.clone());
        }
        let weekdays = activity.interactions.iter().map(|r| r.timestamp.weekday());
        if let Some((day, _, _)) = dominant(weekdays) {
            by_weekday
                .entry(day.num_days_from_monday())
                .or_insert_with(|| (day, Vec::new()))
                .1
                .push(activity.user_id.clone());
        }

        let weekend_count = activity
            .interactions
            .iter()
            .filter(|record| matches!(record.timestamp.weekday(), Weekday::Sat | Weekday::Sun))
            .count();
        if rate(weekend_count, activity.interactions.len()) >= WEEKEND_SHARE {
            weekend.push(activity.user_id.clone());
        }

        session_minutes.extend(activity.sessions.iter().map(|s| s.duration_minutes()));
        if activity
            .sessions
            .iter()
            .any(|session| session.duration_minutes() >= BINGE_MINUTES)
        {
            bingers.push(activity.user_id.clone());
        }

        let active_days: BTreeSet<_> = activity
            .sessions
            .iter()
            .map(|session| session.start.date_naive())
            .collect();
        if rate(activity.sessions.len(), active_days.len()) >= FREQUENT_SESSIONS_PER_DAY {
            frequent.push(activity.user_id.clone());
        }
    }

    let mut metrics = BTreeMap::new();
    metrics.insert("avgSessionMinutes".to_string(), mean(&session_minutes));
    metrics.insert("sessions".to_string(), session_minutes.len() as f64);
    let all = || ctx.activity.iter().flat_map(|a| a.interactions.iter());
    if let Some((hour, _, _)) = dominant(all().map(|r| r.timestamp.hour())) {
        metrics.insert("peakHour".to_string(), hour as f64);
    }
    if let Some((day, _, _)) = dominant(all().map(|r| r.timestamp.weekday())) {
        metrics.insert("peakWeekday".to_string(), day.num_days_from_monday() as f64);
    }

    let mut patterns: Vec<BehaviorPattern> = by_daypart
        .into_iter()
        .filter_map(|(part, users)| {
            ctx.emit(
                BehaviorType::Temporal,
                &format!("{}-viewers", part.slug()),
                format!("{} viewers", capitalize(part.slug())),
                format!("Users most active in the {}", part.slug()),
                users,
                metrics.clone(),
            )
        })
        .collect();

    patterns.extend(by_hour.into_iter().filter_map(|(hour, users)| {
        ctx.emit(
            BehaviorType::Temporal,
            &format!("peak-hour-{:02}", hour),
            format!("Peak hour {:02}:00", hour),
            format!("Users whose busiest hour of the day is {:02}:00", hour),
            users,
            metrics.clone(),
        )
    }));
    patterns.extend(by_weekday.into_values().filter_map(|(day, users)| {
        let name = weekday_name(day);
        ctx.emit(
            BehaviorType::Temporal,
            &format!("peak-day-{}", name.to_lowercase()),
            format!("{} viewers", name),
            format!("Users whose busiest day of the week is {}", name),
            users,
            metrics.clone(),
        )
    }));

    patterns.extend(ctx.emit(
        BehaviorType::Temporal,
        "weekend-watchers",
        "Weekend watchers",
        "Users who do most of their watching on weekends",
        weekend,
        metrics.clone(),
    ));
    patterns.extend(ctx.emit(
        BehaviorType::Temporal,
        "binge-watchers",
        "Binge watchers",
        "Users with sessions of an hour or more",
        bingers,
        metrics.clone(),
    ));
    patterns.extend(ctx.emit(
        BehaviorType::Temporal,
        "frequent-visitors",
        "Frequent visitors",
        "Users who open several sessions on the days they are active",
        frequent,
        metrics,
    ));

    patterns
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
