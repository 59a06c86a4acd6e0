use crate::models::ticket::MealType;
use chrono::{DateTime, FixedOffset, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::PgExecutor;
use uuid::Uuid;

const MEALS_KEY: &str = "meals";

/// Price and redemption window for one meal, hours in institution-local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealConfig {
    pub price: i64,
    pub start_hour: u32,
    pub end_hour: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealSettings {
    pub breakfast: MealConfig,
    pub lunch: MealConfig,
    pub dinner: MealConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowCheck {
    Open,
    /// The meal date is already behind us.
    Expired,
    /// Right date but wrong hour, or a future date.
    OutsideWindow,
}

impl Default for MealSettings {
    fn default() -> Self {
        Self {
            breakfast: MealConfig {
                price: 500,
                start_hour: 7,
                end_hour: 10,
            },
            lunch: MealConfig {
                price: 1000,
                start_hour: 11,
                end_hour: 14,
            },
            dinner: MealConfig {
                price: 1000,
                start_hour: 18,
                end_hour: 21,
            },
        }
    }
}

impl MealSettings {
    pub fn meal(&self, meal_type: MealType) -> &MealConfig {
        match meal_type {
            MealType::Breakfast => &self.breakfast,
            MealType::Lunch => &self.lunch,
            MealType::Dinner => &self.dinner,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        for meal_type in [MealType::Breakfast, MealType::Lunch, MealType::Dinner] {
            let meal = self.meal(meal_type);
            if meal.price <= 0 {
                return Err(format!("{} price must be positive", meal_type));
            }
            if meal.start_hour >= meal.end_hour || meal.end_hour > 24 {
                return Err(format!(
                    "{} window {}-{} is invalid",
                    meal_type, meal.start_hour, meal.end_hour
                ));
            }
        }
        Ok(())
    }

    pub async fn load<'e, E>(executor: E) -> sqlx::Result<Option<Self>>
    where
        E: PgExecutor<'e>,
    {
        let value = sqlx::query_scalar::<_, Json<MealSettings>>(
            "SELECT value FROM system_settings WHERE key = $1",
        )
        .bind(MEALS_KEY)
        .fetch_optional(executor)
        .await?;

        Ok(value.map(|Json(settings)| settings))
    }

    pub async fn save<'e, E>(&self, executor: E, updated_by: Uuid) -> sqlx::Result<()>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO system_settings (key, value, updated_by, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value,
                updated_by = EXCLUDED.updated_by,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(MEALS_KEY)
        .bind(Json(self))
        .bind(updated_by)
        .bind(Utc::now())
        .execute(executor)
        .await?;

        Ok(())
    }
}

impl MealConfig {
    /// Decides whether a ticket for `meal_date` can be redeemed at `now`.
    pub fn check_window(
        &self,
        meal_date: NaiveDate,
        now: DateTime<Utc>,
        offset: FixedOffset,
    ) -> WindowCheck {
        let local = now.with_timezone(&offset);
        let today = local.date_naive();

        if meal_date < today {
            return WindowCheck::Expired;
        }
        if meal_date > today {
            return WindowCheck::OutsideWindow;
        }

        let hour = local.hour();
        if hour >= self.start_hour && hour < self.end_hour {
            WindowCheck::Open
        } else {
            WindowCheck::OutsideWindow
        }
    }
}

/// Calendar date at the institution for `now`.
pub fn local_today(now: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    now.with_timezone(&offset).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn lunch_inside_window_is_open() {
        let lunch = MealSettings::default().lunch;
        let result = lunch.check_window(date(2025, 3, 1), at(2025, 3, 1, 12, 30), utc());
        assert_eq!(result, WindowCheck::Open);
    }

    #[test]
    fn end_hour_is_exclusive() {
        let lunch = MealSettings::default().lunch;
        assert_eq!(
            lunch.check_window(date(2025, 3, 1), at(2025, 3, 1, 14, 0), utc()),
            WindowCheck::OutsideWindow
        );
        assert_eq!(
            lunch.check_window(date(2025, 3, 1), at(2025, 3, 1, 11, 0), utc()),
            WindowCheck::Open
        );
    }

    #[test]
    fn same_day_outside_window_is_rejected() {
        let lunch = MealSettings::default().lunch;
        let result = lunch.check_window(date(2025, 3, 1), at(2025, 3, 1, 16, 0), utc());
        assert_eq!(result, WindowCheck::OutsideWindow);
    }

    #[test]
    fn yesterday_is_expired_even_inside_hours() {
        let lunch = MealSettings::default().lunch;
        let result = lunch.check_window(date(2025, 2, 28), at(2025, 3, 1, 12, 0), utc());
        assert_eq!(result, WindowCheck::Expired);
    }

    #[test]
    fn future_date_is_not_yet_redeemable() {
        let lunch = MealSettings::default().lunch;
        let result = lunch.check_window(date(2025, 3, 2), at(2025, 3, 1, 12, 0), utc());
        assert_eq!(result, WindowCheck::OutsideWindow);
    }

    #[test]
    fn offset_shifts_local_date_and_hour() {
        // 23:30 UTC on Feb 28 is 12:30 on Mar 1 at UTC+13
        let offset = FixedOffset::east_opt(13 * 3600).unwrap();
        let lunch = MealSettings::default().lunch;
        let result = lunch.check_window(date(2025, 3, 1), at(2025, 2, 28, 23, 30), offset);
        assert_eq!(result, WindowCheck::Open);
        assert_eq!(local_today(at(2025, 2, 28, 23, 30), offset), date(2025, 3, 1));
    }

    #[test]
    fn validation_rejects_bad_windows_and_prices() {
        let mut settings = MealSettings::default();
        assert!(settings.validate().is_ok());

        settings.dinner.start_hour = 21;
        assert!(settings.validate().unwrap_err().contains("dinner"));

        let mut settings = MealSettings::default();
        settings.breakfast.price = 0;
        assert!(settings.validate().is_err());

        let mut settings = MealSettings::default();
        settings.lunch.end_hour = 25;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn settings_json_shape_matches_storage() {
        let json = serde_json::json!({
            "breakfast": {"price": 500, "start_hour": 7, "end_hour": 10},
            "lunch": {"price": 1000, "start_hour": 11, "end_hour": 14},
            "dinner": {"price": 1000, "start_hour": 18, "end_hour": 21}
        });
        let parsed: MealSettings = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, MealSettings::default());
    }
}
