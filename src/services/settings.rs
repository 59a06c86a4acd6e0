use crate::error::{ServiceError, ServiceResult};
use crate::models::{Account, MealSettings};
use log::{info, warn};
use sqlx::PgPool;

/// Where purchase and redemption read meal prices and windows from.
///
/// Every operation takes one snapshot up front and works off that copy, so a
/// concurrent settings change never splits a single purchase or scan.
#[derive(Debug, Clone)]
pub enum SettingsSource {
    /// Latest row in `system_settings`.
    Stored,
    /// A fixed snapshot, used by tests and tooling.
    Fixed(MealSettings),
}

impl SettingsSource {
    pub async fn snapshot(&self, pool: &PgPool) -> ServiceResult<MealSettings> {
        match self {
            SettingsSource::Fixed(settings) => Ok(settings.clone()),
            SettingsSource::Stored => match MealSettings::load(pool).await? {
                Some(settings) => Ok(settings),
                None => {
                    warn!("No meal settings stored, falling back to defaults");
                    Ok(MealSettings::default())
                }
            },
        }
    }
}

#[derive(Clone)]
pub struct SettingsService {
    pool: PgPool,
    source: SettingsSource,
}

impl SettingsService {
    pub fn new(pool: PgPool, source: SettingsSource) -> Self {
        Self { pool, source }
    }

    pub async fn current(&self) -> ServiceResult<MealSettings> {
        self.source.snapshot(&self.pool).await
    }

    pub async fn update(&self, actor: &Account, settings: MealSettings) -> ServiceResult<MealSettings> {
        if !actor.role.is_super_admin() {
            return Err(ServiceError::Forbidden(
                "Only super admins can change meal settings".to_string(),
            ));
        }

        settings.validate().map_err(ServiceError::InvalidSettings)?;
        settings.save(&self.pool, actor.id).await?;

        info!(
            "Meal settings updated by {}: breakfast={} lunch={} dinner={}",
            actor.id, settings.breakfast.price, settings.lunch.price, settings.dinner.price
        );

        Ok(settings)
    }
}
