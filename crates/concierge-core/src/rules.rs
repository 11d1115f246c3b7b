//! Rule-based suggestion generator
//!
//! Turns analyzer observations into templated drafts with fixed priorities:
//! - Spouse birthday: anniversary reminder, optionally naming a restaurant
//! - Flower purchase ahead of the spouse birthday, when the user buys flowers
//! - Own birthday tomorrow
//! - Recurring purchases that look due
//!
//! Before emitting, each draft is checked against live suggestions in the
//! store so the same reminder is not produced twice.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::debug;

use crate::analyzer::{
    find_co_occurrence, scan_recurrences, scan_special_dates, Affinity, Recurrence, SpecialDate,
    SpecialDateKind,
};
use crate::config::RuleSettings;
use crate::db::{Database, SuggestionMatch};
use crate::error::Result;
use crate::models::{Priority, Profile, SuggestionContext, SuggestionDraft, SuggestionType};

/// Rule-based generator bound to one store
pub struct RuleGenerator<'a> {
    db: &'a Database,
    rules: &'a RuleSettings,
    flowers: Affinity,
}

impl<'a> RuleGenerator<'a> {
    pub fn new(db: &'a Database, rules: &'a RuleSettings) -> Result<Self> {
        Ok(Self {
            db,
            rules,
            flowers: Affinity::flowers()?,
        })
    }

    /// Drafts for birthdays inside their windows
    pub fn special_date_drafts(
        &self,
        user_id: i64,
        profile: Option<&Profile>,
        now: NaiveDateTime,
    ) -> Result<Vec<SuggestionDraft>> {
        let today = now.date();
        let dates = scan_special_dates(profile, today, self.rules);
        if dates.is_empty() {
            return Ok(Vec::new());
        }

        // Only needed for the spouse rules, loaded once
        let history = if dates
            .iter()
            .any(|d| d.kind == SpecialDateKind::SpouseBirthday)
        {
            self.db.list_all_spending(user_id)?
        } else {
            Vec::new()
        };

        let mut drafts = Vec::new();
        for date in &dates {
            match date.kind {
                SpecialDateKind::SpouseBirthday => {
                    let Some(person) = date.person.as_deref() else {
                        continue;
                    };
                    let restaurant = find_co_occurrence(&history, date.anchor, today, self.rules)
                        .map(|c| c.description);

                    let birthday = self.spouse_birthday_draft(date, person, restaurant);
                    if !self.already_suggested(user_id, &birthday, now, true)? {
                        drafts.push(birthday);
                    }

                    if self.flowers.holds(&history, self.rules.affinity_min_count) {
                        let flowers = flower_draft(date, person);
                        if !self.already_suggested(user_id, &flowers, now, true)? {
                            drafts.push(flowers);
                        }
                    }
                }
                SpecialDateKind::OwnBirthday => {
                    let draft = own_birthday_draft(date);
                    if !self.already_suggested(user_id, &draft, now, true)? {
                        drafts.push(draft);
                    }
                }
            }
        }

        debug!(user_id, count = drafts.len(), "Special-date drafts");
        Ok(drafts)
    }

    /// Drafts for recurring purchases that look due
    pub fn pattern_drafts(&self, user_id: i64, now: NaiveDateTime) -> Result<Vec<SuggestionDraft>> {
        let today = now.date();
        let since = now - Duration::days(self.rules.recurrence_window_days);
        let groups = self
            .db
            .recurring_groups(user_id, since, self.rules.min_occurrences)?;

        let mut drafts = Vec::new();
        for recurrence in scan_recurrences(&groups, today, self.rules) {
            if !recurrence.due {
                continue;
            }

            // Same habit already nudged recently, even if the wording changed
            let lookback = now - Duration::days(self.rules.dedup_lookback_days);
            let nudged = self.db.has_active_suggestion(
                &SuggestionMatch::live(user_id, SuggestionType::Routine)
                    .created_since(lookback)
                    .context_eq("$.description", recurrence.description.clone()),
            )?;
            if nudged {
                debug!(description = %recurrence.description, "Recurring pattern already suggested");
                continue;
            }

            let draft = recurring_draft(&recurrence, today);
            if !self.already_suggested(user_id, &draft, now, false)? {
                drafts.push(draft);
            }
        }

        debug!(user_id, count = drafts.len(), "Pattern drafts");
        Ok(drafts)
    }

    /// Live suggestion with the same type and either the same scheduled day
    /// (when `match_day`) or the same content fingerprint within the lookback.
    fn already_suggested(
        &self,
        user_id: i64,
        draft: &SuggestionDraft,
        now: NaiveDateTime,
        match_day: bool,
    ) -> Result<bool> {
        if match_day {
            let same_day = SuggestionMatch::live(user_id, draft.suggestion_type)
                .scheduled_on(draft.scheduled_date.date());
            if self.db.has_active_suggestion(&same_day)? {
                return Ok(true);
            }
        }

        let lookback = now - Duration::days(self.rules.dedup_lookback_days);
        let same_content = SuggestionMatch::live(user_id, draft.suggestion_type)
            .with_content_hash(draft.content_hash())
            .created_since(lookback);
        self.db.has_active_suggestion(&same_content)
    }

    fn spouse_birthday_draft(
        &self,
        date: &SpecialDate,
        person: &str,
        restaurant: Option<String>,
    ) -> SuggestionDraft {
        let mut content = format!(
            "O aniversário de {} está chegando ({}). ",
            person,
            date.next_occurrence.format("%d/%m")
        );
        match &restaurant {
            Some(place) => content.push_str(&format!("Deseja que eu reserve o {}?", place)),
            None => content.push_str("Gostaria de fazer uma reserva em algum restaurante especial?"),
        }

        let priority = if date.days_until <= self.rules.high_priority_window_days {
            Priority::High
        } else {
            Priority::Medium
        };

        SuggestionDraft::new(
            SuggestionType::Anniversary,
            content,
            priority.value(),
            start_of(date.next_occurrence),
            SuggestionContext::SpecialDate {
                person: Some(person.to_string()),
                occasion: "birthday".to_string(),
                days_until: date.days_until,
                suggested_restaurant: restaurant,
            },
        )
    }
}

fn flower_draft(date: &SpecialDate, person: &str) -> SuggestionDraft {
    SuggestionDraft::new(
        SuggestionType::Purchase,
        format!(
            "Nos últimos anos você enviou flores para {}. Posso providenciar um buquê especial?",
            person
        ),
        Priority::Medium.value(),
        start_of(date.next_occurrence - Duration::days(1)),
        SuggestionContext::Gift {
            person: person.to_string(),
            occasion: "birthday".to_string(),
            item: "flowers".to_string(),
        },
    )
}

fn own_birthday_draft(date: &SpecialDate) -> SuggestionDraft {
    SuggestionDraft::new(
        SuggestionType::Seasonal,
        "Amanhã é seu aniversário! 🎉 Gostaria de algumas sugestões para comemorar?",
        Priority::Low.value(),
        start_of(date.next_occurrence),
        SuggestionContext::UserBirthday {
            occasion: "user_birthday".to_string(),
        },
    )
}

fn recurring_draft(recurrence: &Recurrence, today: NaiveDate) -> SuggestionDraft {
    SuggestionDraft::new(
        SuggestionType::Routine,
        format!(
            "Está na hora de {}? Você costuma fazer isso a cada {} dias.",
            humanize(&recurrence.category, &recurrence.description),
            recurrence.average_interval_days.floor() as i64
        ),
        Priority::Low.value(),
        start_of(today),
        SuggestionContext::Recurring {
            description: recurrence.description.clone(),
            category: recurrence.category.clone(),
            frequency: recurrence.count,
            average_interval_days: recurrence.average_interval_days,
            days_since_last: recurrence.days_since_last,
        },
    )
}

/// Phrase a (category, description) pair as an activity
pub fn humanize(category: &str, description: &str) -> String {
    match category.to_lowercase().as_str() {
        "restaurant" => format!("jantar no {}", description),
        "grocery" => format!("fazer compras no {}", description),
        "gas" => format!("abastecer no {}", description),
        "subscription" => format!("renovar sua assinatura {}", description),
        "gym" => "renovar a mensalidade da academia".to_string(),
        _ => format!("{} - {}", category, description),
    }
}

fn start_of(day: NaiveDate) -> NaiveDateTime {
    day.and_time(NaiveTime::MIN)
}
