use std::sync::Arc;

use tracing::info;

use crate::db::models::{TeamMember, TeamMemberForm};
use crate::db::{ScheduleRepository, TeamRepository};
use crate::error::{AppError, AppResult};
use crate::services::clock::Clock;

pub struct TeamService {
    team: Arc<dyn TeamRepository>,
    schedule: Arc<dyn ScheduleRepository>,
    clock: Arc<dyn Clock>,
}

fn check_id(id: i64) -> AppResult<()> {
    if id <= 0 {
        return Err(AppError::BadRequest(format!(
            "invalid team member ID: {}",
            id
        )));
    }
    Ok(())
}

fn check_form(form: &TeamMemberForm) -> AppResult<()> {
    let errors = form.validate();
    if !errors.is_empty() {
        return Err(AppError::Validation(errors.join(", ")));
    }
    Ok(())
}

impl TeamService {
    pub fn new(
        team: Arc<dyn TeamRepository>,
        schedule: Arc<dyn ScheduleRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            team,
            schedule,
            clock,
        }
    }

    pub async fn list_members(&self) -> AppResult<Vec<TeamMember>> {
        self.team.list_all().await
    }

    pub async fn get_member(&self, id: i64) -> AppResult<TeamMember> {
        check_id(id)?;
        self.team
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("team member with ID {} not found", id)))
    }

    /// Active members in rotation order.
    pub async fn active_members(&self) -> AppResult<Vec<TeamMember>> {
        self.team.list_active().await
    }

    pub async fn member_count(&self) -> AppResult<i64> {
        self.team.count().await
    }

    pub async fn create_member(&self, form: &TeamMemberForm) -> AppResult<TeamMember> {
        check_form(form)?;

        let handle = form.normalized_slack_handle();
        if let Some(ref handle) = handle {
            self.ensure_handle_free(handle, None).await?;
        }

        let member = self
            .team
            .create(form.name.trim(), handle.as_deref(), form.active)
            .await?;
        info!("Created team member {} ({})", member.id, member.name);
        Ok(member)
    }

    pub async fn update_member(&self, id: i64, form: &TeamMemberForm) -> AppResult<TeamMember> {
        check_id(id)?;
        check_form(form)?;

        let mut member = self.get_member(id).await?;
        let handle = form.normalized_slack_handle();
        if let Some(ref handle) = handle {
            self.ensure_handle_free(handle, Some(id)).await?;
        }

        member.name = form.name.trim().to_string();
        member.slack_handle = handle;
        member.active = form.active;
        self.team.update(&member).await
    }

    pub async fn activate_member(&self, id: i64) -> AppResult<TeamMember> {
        self.set_active(id, true).await
    }

    /// Takes the member out of rotation without touching their history.
    pub async fn deactivate_member(&self, id: i64) -> AppResult<TeamMember> {
        self.set_active(id, false).await
    }

    pub async fn delete_member(&self, id: i64) -> AppResult<()> {
        check_id(id)?;
        self.get_member(id).await?;

        if self
            .schedule
            .has_future_entries(id, self.clock.today())
            .await?
        {
            return Err(AppError::BadRequest(
                "cannot delete team member with future schedule assignments. Consider deactivating instead"
                    .to_string(),
            ));
        }

        let others_active = self
            .team
            .list_active()
            .await?
            .iter()
            .filter(|m| m.id != id)
            .count();
        if others_active == 0 {
            return Err(AppError::BadRequest(
                "cannot delete the last team member. At least one team member must remain"
                    .to_string(),
            ));
        }

        self.team.delete(id).await?;
        info!("Deleted team member {}", id);
        Ok(())
    }

    async fn set_active(&self, id: i64, active: bool) -> AppResult<TeamMember> {
        check_id(id)?;
        let mut member = self.get_member(id).await?;
        if member.active == active {
            let state = if active { "active" } else { "inactive" };
            return Err(AppError::BadRequest(format!(
                "team member is already {}",
                state
            )));
        }

        member.active = active;
        let member = self.team.update(&member).await?;
        info!(
            "Team member {} is now {}",
            member.id,
            if active { "active" } else { "inactive" }
        );
        Ok(member)
    }

    /// Slack handles are unique regardless of case.
    async fn ensure_handle_free(&self, handle: &str, except: Option<i64>) -> AppResult<()> {
        let taken = self.team.list_all().await?.into_iter().any(|m| {
            Some(m.id) != except
                && m
                    .slack_handle
                    .as_deref()
                    .is_some_and(|h| h.eq_ignore_ascii_case(handle))
        });

        if taken {
            return Err(AppError::Conflict(format!(
                "team member with slack handle {} already exists",
                handle
            )));
        }
        Ok(())
    }
}
