use std::sync::Arc;

use tracing::info;

use crate::db::models::{day_name, is_valid_day_of_week, WorkingHours, WorkingHoursForm};
use crate::db::WorkingHoursRepository;
use crate::error::{AppError, AppResult};

/// Times stored for a day that produces no shift.
const INACTIVE_TIME: &str = "00:00";

pub struct WorkingHoursService {
    hours: Arc<dyn WorkingHoursRepository>,
}

fn check_day(day_of_week: i64) -> AppResult<()> {
    if !is_valid_day_of_week(day_of_week) {
        return Err(AppError::BadRequest(format!(
            "invalid day of week: {} (must be 0-6)",
            day_of_week
        )));
    }
    Ok(())
}

impl WorkingHoursService {
    pub fn new(hours: Arc<dyn WorkingHoursRepository>) -> Self {
        Self { hours }
    }

    pub async fn list_working_hours(&self) -> AppResult<Vec<WorkingHours>> {
        self.hours.list_all().await
    }

    pub async fn get_by_day(&self, day_of_week: i64) -> AppResult<WorkingHours> {
        check_day(day_of_week)?;
        self.hours.find_by_day(day_of_week).await?.ok_or_else(|| {
            AppError::NotFound(format!("working hours for {} not found", day_name(day_of_week)))
        })
    }

    pub async fn active_days(&self) -> AppResult<Vec<WorkingHours>> {
        self.hours.list_active().await
    }

    pub async fn is_working_day(&self, day_of_week: i64) -> AppResult<bool> {
        Ok(self.get_by_day(day_of_week).await?.active)
    }

    pub fn day_name(&self, day_of_week: i64) -> &'static str {
        day_name(day_of_week)
    }

    pub async fn update_day(
        &self,
        day_of_week: i64,
        form: &WorkingHoursForm,
    ) -> AppResult<WorkingHours> {
        check_day(day_of_week)?;
        let form = WorkingHoursForm {
            day_of_week,
            ..form.clone()
        };
        let errors = form.validate();
        if !errors.is_empty() {
            return Err(AppError::Validation(errors.join(", ")));
        }

        let mut hours = self.get_by_day(day_of_week).await?;
        hours.active = form.active;
        if form.active {
            hours.start_time = form.start_time.trim().to_string();
            hours.end_time = form.end_time.trim().to_string();
        } else {
            hours.start_time = INACTIVE_TIME.to_string();
            hours.end_time = INACTIVE_TIME.to_string();
        }

        let updated = self.hours.update(&hours).await?;
        info!(
            "Updated working hours for {}: {}-{} (active: {})",
            updated.day_name(),
            updated.start_time,
            updated.end_time,
            updated.active
        );
        Ok(updated)
    }

    /// Validates every form before applying any of them.
    pub async fn update_all(&self, forms: &[WorkingHoursForm]) -> AppResult<Vec<WorkingHours>> {
        for form in forms {
            check_day(form.day_of_week)?;
            let errors = form.validate();
            if !errors.is_empty() {
                return Err(AppError::Validation(format!(
                    "validation failed for {}: {}",
                    day_name(form.day_of_week),
                    errors.join(", ")
                )));
            }
        }

        if !forms.iter().any(|f| f.active) {
            return Err(AppError::Validation(
                "at least one working day must be active".to_string(),
            ));
        }

        let mut updated = Vec::with_capacity(forms.len());
        for form in forms {
            updated.push(self.update_day(form.day_of_week, form).await?);
        }
        Ok(updated)
    }
}
