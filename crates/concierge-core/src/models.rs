//! Domain models for Concierge

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;

/// A registered user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// What kind of money movement a transaction records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    #[default]
    Expense,
    Income,
    Savings,
    /// Audit record for profile and preference changes
    System,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expense => "expense",
            Self::Income => "income",
            Self::Savings => "savings",
            Self::System => "system",
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "expense" => Ok(Self::Expense),
            "income" => Ok(Self::Income),
            "savings" | "saving" => Ok(Self::Savings),
            "system" => Ok(Self::System),
            _ => Err(format!("Unknown transaction type: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A financial record. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    /// Fixed-point amount, two decimal places
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub category: String,
    pub description: String,
    pub date: NaiveDateTime,
    pub location: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// A transaction to be inserted
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: i64,
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub category: String,
    pub description: String,
    pub date: NaiveDateTime,
    pub location: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl NewTransaction {
    /// An expense with no location or metadata
    pub fn expense(
        user_id: i64,
        amount: Decimal,
        category: &str,
        description: &str,
        date: NaiveDateTime,
    ) -> Self {
        Self {
            user_id,
            amount: amount.round_dp(2),
            transaction_type: TransactionType::Expense,
            category: category.to_string(),
            description: description.to_string(),
            date,
            location: None,
            metadata: None,
        }
    }
}

/// Personal facts and preferences, one per user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: i64,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub spouse_name: Option<String>,
    pub spouse_birth_date: Option<NaiveDate>,
    pub preferences: Preferences,
}

impl Profile {
    /// Spouse name and birth date, only when both are known
    pub fn spouse(&self) -> Option<(&str, NaiveDate)> {
        match (self.spouse_name.as_deref(), self.spouse_birth_date) {
            (Some(name), Some(date)) if !name.trim().is_empty() => Some((name, date)),
            _ => None,
        }
    }
}

/// Fields to change on a profile. `None` leaves the field as is.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub spouse_name: Option<String>,
    pub spouse_birth_date: Option<NaiveDate>,
}

impl ProfileUpdate {
    /// Names of the fields this update touches
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.name.is_some() {
            fields.push("name");
        }
        if self.phone.is_some() {
            fields.push("phone");
        }
        if self.birth_date.is_some() {
            fields.push("birth_date");
        }
        if self.spouse_name.is_some() {
            fields.push("spouse_name");
        }
        if self.spouse_birth_date.is_some() {
            fields.push("spouse_birth_date");
        }
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.changed_fields().is_empty()
    }
}

/// Notification channel toggles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationPrefs {
    pub email: bool,
    pub push: bool,
    pub sms: bool,
}

impl Default for NotificationPrefs {
    fn default() -> Self {
        Self {
            email: true,
            push: true,
            sms: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuietHours {
    pub enabled: bool,
    /// "HH:MM"
    pub start: String,
    pub end: String,
}

impl Default for QuietHours {
    fn default() -> Self {
        Self {
            enabled: false,
            start: "22:00".to_string(),
            end: "08:00".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferredTimes {
    pub morning: bool,
    pub afternoon: bool,
    pub evening: bool,
    pub night: bool,
}

impl Default for PreferredTimes {
    fn default() -> Self {
        Self {
            morning: true,
            afternoon: true,
            evening: true,
            night: true,
        }
    }
}

impl PreferredTimes {
    /// Enabled slots, in day order
    pub fn enabled(&self) -> Vec<&'static str> {
        [
            ("morning", self.morning),
            ("afternoon", self.afternoon),
            ("evening", self.evening),
            ("night", self.night),
        ]
        .into_iter()
        .filter(|(_, on)| *on)
        .map(|(name, _)| name)
        .collect()
    }
}

/// User-tunable settings stored as JSON alongside the profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub notifications: NotificationPrefs,
    /// Per suggestion type toggle, keyed by `SuggestionType::as_str`
    pub suggestion_categories: BTreeMap<String, bool>,
    pub quiet_hours: QuietHours,
    pub suggestion_frequency: String,
    pub max_daily_suggestions: u32,
    pub categories_of_interest: Vec<String>,
    pub preferred_times: PreferredTimes,
}

impl Default for Preferences {
    fn default() -> Self {
        let suggestion_categories = [
            SuggestionType::Anniversary,
            SuggestionType::Purchase,
            SuggestionType::Routine,
            SuggestionType::Seasonal,
        ]
        .into_iter()
        .map(|t| (t.as_str().to_string(), true))
        .collect();

        Self {
            notifications: NotificationPrefs::default(),
            suggestion_categories,
            quiet_hours: QuietHours::default(),
            suggestion_frequency: "normal".to_string(),
            max_daily_suggestions: 5,
            categories_of_interest: Vec::new(),
            preferred_times: PreferredTimes::default(),
        }
    }
}

impl Preferences {
    /// Types missing from the map are enabled
    pub fn allows(&self, suggestion_type: SuggestionType) -> bool {
        self.suggestion_categories
            .get(suggestion_type.as_str())
            .copied()
            .unwrap_or(true)
    }
}

/// Fixed priority scale used by the rule-based generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn value(&self) -> u8 {
        match self {
            Self::Low => 3,
            Self::Medium => 5,
            Self::High => 8,
            Self::Urgent => 10,
        }
    }
}

impl From<Priority> for u8 {
    fn from(p: Priority) -> u8 {
        p.value()
    }
}

pub const MIN_PRIORITY: u8 = 1;
pub const MAX_PRIORITY: u8 = 10;

/// Clamp any integer priority into 1..=10
pub fn clamp_priority(raw: i64) -> u8 {
    raw.clamp(MIN_PRIORITY as i64, MAX_PRIORITY as i64) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionType {
    Anniversary,
    Purchase,
    Routine,
    Seasonal,
    Savings,
    Reminder,
    Recommendation,
}

impl SuggestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anniversary => "anniversary",
            Self::Purchase => "purchase",
            Self::Routine => "routine",
            Self::Seasonal => "seasonal",
            Self::Savings => "savings",
            Self::Reminder => "reminder",
            Self::Recommendation => "recommendation",
        }
    }

    /// Lenient mapping for model-declared types. Unknown labels become `Routine`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "anniversary" => Self::Anniversary,
            "purchase" => Self::Purchase,
            "seasonal" => Self::Seasonal,
            "saving" | "savings" => Self::Savings,
            "reminder" => Self::Reminder,
            "recommendation" => Self::Recommendation,
            // "health" and anything unrecognized
            _ => Self::Routine,
        }
    }
}

impl std::str::FromStr for SuggestionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "anniversary" => Ok(Self::Anniversary),
            "purchase" => Ok(Self::Purchase),
            "routine" => Ok(Self::Routine),
            "seasonal" => Ok(Self::Seasonal),
            "savings" => Ok(Self::Savings),
            "reminder" => Ok(Self::Reminder),
            "recommendation" => Ok(Self::Recommendation),
            _ => Err(format!("Unknown suggestion type: {}", s)),
        }
    }
}

impl std::fmt::Display for SuggestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Suggestion lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
    Snoozed,
    Executed,
    Expired,
}

impl SuggestionStatus {
    /// Statuses that still count as "already suggested" for dedup
    pub const LIVE: [SuggestionStatus; 3] = [Self::Pending, Self::Accepted, Self::Snoozed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Snoozed => "snoozed",
            Self::Executed => "executed",
            Self::Expired => "expired",
        }
    }

    /// Pending or snoozed: still waiting on the user
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Snoozed)
    }

    /// Transitions are one-way. Snooze may repeat, and an accepted
    /// suggestion can still be executed.
    pub fn can_transition_to(&self, next: SuggestionStatus) -> bool {
        use SuggestionStatus::*;
        match (self, next) {
            (Pending | Snoozed, Accepted | Rejected | Snoozed | Executed | Expired) => true,
            (Accepted, Executed) => true,
            _ => false,
        }
    }
}

impl std::str::FromStr for SuggestionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            "snoozed" => Ok(Self::Snoozed),
            "executed" => Ok(Self::Executed),
            "expired" => Ok(Self::Expired),
            _ => Err(format!("Unknown suggestion status: {}", s)),
        }
    }
}

impl std::fmt::Display for SuggestionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a suggestion was generated. Stored as JSON in `context_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SuggestionContext {
    /// A birthday or anniversary coming up
    SpecialDate {
        #[serde(skip_serializing_if = "Option::is_none")]
        person: Option<String>,
        occasion: String,
        days_until: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        suggested_restaurant: Option<String>,
    },
    /// A purchase tied to a special date
    Gift {
        person: String,
        occasion: String,
        item: String,
    },
    UserBirthday {
        occasion: String,
    },
    /// A repeating (category, description) purchase that looks due
    Recurring {
        description: String,
        category: String,
        frequency: u32,
        average_interval_days: f64,
        days_since_last: i64,
    },
    /// Produced by a language model
    Generated {
        reasoning: String,
        generated_by: String,
        model: String,
        category: String,
    },
}

impl SuggestionContext {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

/// A candidate suggestion before it is persisted
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestionDraft {
    pub suggestion_type: SuggestionType,
    pub content: String,
    /// Always within 1..=10
    pub priority: u8,
    pub scheduled_date: NaiveDateTime,
    pub context: SuggestionContext,
}

impl SuggestionDraft {
    pub fn new(
        suggestion_type: SuggestionType,
        content: impl Into<String>,
        priority: impl Into<i64>,
        scheduled_date: NaiveDateTime,
        context: SuggestionContext,
    ) -> Self {
        Self {
            suggestion_type,
            content: content.into(),
            priority: clamp_priority(priority.into()),
            scheduled_date,
            context,
        }
    }

    /// Context serialized for storage
    pub fn context_data(&self) -> Result<String> {
        self.context.to_json()
    }

    pub fn content_hash(&self) -> String {
        content_fingerprint(&self.content)
    }
}

/// SHA-256 over the lowercased, whitespace-collapsed content
pub fn content_fingerprint(content: &str) -> String {
    let normalized = content
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

/// A persisted suggestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: i64,
    pub user_id: i64,
    pub suggestion_type: SuggestionType,
    pub content: String,
    pub priority: u8,
    pub status: SuggestionStatus,
    pub scheduled_date: NaiveDateTime,
    pub context_data: Option<String>,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
}

impl Suggestion {
    /// Decoded context, if present and well-formed
    pub fn context(&self) -> Option<SuggestionContext> {
        self.context_data
            .as_deref()
            .and_then(|s| SuggestionContext::from_json(s).ok())
    }

    /// Active and past its scheduled date
    pub fn is_overdue(&self, now: NaiveDateTime) -> bool {
        self.status.is_active() && self.scheduled_date < now
    }
}

/// How a user responded to a suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionAction {
    Viewed,
    Accepted,
    Rejected,
    Snoozed,
    Executed,
    Dismissed,
    Clicked,
}

impl InteractionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Viewed => "viewed",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Snoozed => "snoozed",
            Self::Executed => "executed",
            Self::Dismissed => "dismissed",
            Self::Clicked => "clicked",
        }
    }

    /// Status an action moves the suggestion to, if any
    pub fn target_status(&self) -> Option<SuggestionStatus> {
        match self {
            Self::Accepted => Some(SuggestionStatus::Accepted),
            Self::Rejected => Some(SuggestionStatus::Rejected),
            Self::Snoozed => Some(SuggestionStatus::Snoozed),
            Self::Executed => Some(SuggestionStatus::Executed),
            Self::Viewed | Self::Dismissed | Self::Clicked => None,
        }
    }
}

impl std::str::FromStr for InteractionAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "viewed" | "view" => Ok(Self::Viewed),
            "accepted" | "accept" => Ok(Self::Accepted),
            "rejected" | "reject" => Ok(Self::Rejected),
            "snoozed" | "snooze" => Ok(Self::Snoozed),
            "executed" | "execute" => Ok(Self::Executed),
            "dismissed" | "dismiss" => Ok(Self::Dismissed),
            "clicked" | "click" => Ok(Self::Clicked),
            _ => Err(format!("Unknown interaction action: {}", s)),
        }
    }
}

impl std::fmt::Display for InteractionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Append-only record of a user response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub id: i64,
    pub user_id: i64,
    pub suggestion_id: i64,
    pub action: InteractionAction,
    pub feedback: Option<String>,
    pub extra_data: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

/// Per-user suggestion counts and rates
#[derive(Debug, Clone, Default, Serialize)]
pub struct SuggestionStats {
    pub total: i64,
    pub pending: i64,
    pub accepted: i64,
    pub rejected: i64,
    pub executed: i64,
    /// (accepted + executed) / total
    pub acceptance_rate: f64,
    pub execution_rate: f64,
    pub by_type: BTreeMap<String, i64>,
    pub by_status: BTreeMap<String, i64>,
    /// Mean hours from creation to execution
    pub average_hours_to_action: Option<f64>,
}

/// The nearest upcoming special date for a user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportantDate {
    pub date: NaiveDate,
    pub kind: String,
    pub description: String,
}

/// Overview shown by the dashboard command
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub days_active: i64,
    pub pending_suggestions: i64,
    pub suggestions_this_week: i64,
    pub acceptance_rate: f64,
    pub transactions_this_month: i64,
    pub spent_this_month: Decimal,
    pub last_activity: Option<NaiveDateTime>,
    pub next_important_date: Option<ImportantDate>,
}
