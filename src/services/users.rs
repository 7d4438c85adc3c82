//! User and role management
//!
//! Role changes and deactivations are recorded in the user's history.
//! Deactivating a user unassigns their open reports; deactivating a role
//! moves its members to another role.

use std::collections::HashMap;

use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use crate::config::{AuthConfig, RbacConfig};
use crate::db::{self, HistoryRepository, ReportRepository, RoleRepository, UserRepository};
use crate::models::{
    CascadeSummary, ChangeRoleRequest, CreateRoleRequest, CreateUserRequest, DeactivateRequest,
    EntityType, HistoryAction, HistoryEntry, NewHistoryEntry, Role, UpdateRoleRequest,
    UpdateUserRequest, User, UserPublic, UserQuery,
};
use crate::services::auth::AuthService;
use crate::services::reports::{apply_unassign, load_report};
use crate::utils::validation::check_password;
use crate::utils::{AppError, AppResult};

pub struct UserService {
    pool: SqlitePool,
    password_min_length: usize,
    default_role: String,
}

impl UserService {
    pub fn new(pool: SqlitePool, auth: &AuthConfig, rbac: &RbacConfig) -> Self {
        Self {
            pool,
            password_min_length: auth.password_min_length,
            default_role: rbac.default_role.clone(),
        }
    }

    // ---------------------------------------------------------------------
    // Users
    // ---------------------------------------------------------------------

    pub async fn list_users(&self, query: &UserQuery) -> AppResult<Vec<UserPublic>> {
        let users = UserRepository::new(&self.pool).list(query).await?;
        let role_names: HashMap<Uuid, String> = RoleRepository::new(&self.pool)
            .list(true)
            .await?
            .into_iter()
            .map(|r| (r.id, r.name))
            .collect();

        Ok(users
            .into_iter()
            .map(|user| {
                let name = role_names.get(&user.role_id).cloned();
                let public = UserPublic::from(user);
                match name {
                    Some(name) => public.with_role_name(name),
                    None => public,
                }
            })
            .collect())
    }

    pub async fn get_user(&self, id: Uuid) -> AppResult<UserPublic> {
        let user = UserRepository::new(&self.pool)
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("User {} not found", id)))?;
        self.with_role_name(user).await
    }

    pub async fn create_user(&self, req: CreateUserRequest, actor: Option<Uuid>) -> AppResult<UserPublic> {
        req.validate()?;
        check_password(&req.password, self.password_min_length).map_err(AppError::BadRequest)?;

        let mut tx = self.pool.begin().await?;

        let role = match req.role_id {
            Some(role_id) => active_role(&mut tx, role_id).await?,
            None => self.default_role_in(&mut tx).await?,
        };

        let mut user = User::new(
            req.username.trim().to_string(),
            req.email.trim().to_string(),
            req.full_name.trim().to_string(),
            AuthService::hash_password(&req.password)?,
            role.id,
        );
        user.is_admin = req.is_admin;

        UserRepository::insert(&mut tx, &user).await?;
        HistoryRepository::record(
            &mut *tx,
            &NewHistoryEntry::user(user.id, HistoryAction::Created)
                .change("role", None::<String>, Some(role.name.as_str()))
                .actor(actor),
        )
        .await?;
        tx.commit().await?;

        info!(user_id = %user.id, username = %user.username, role = %role.name, "User created");
        Ok(UserPublic::from(user).with_role_name(role.name))
    }

    pub async fn update_user(&self, id: Uuid, req: UpdateUserRequest, actor: Uuid) -> AppResult<UserPublic> {
        req.validate()?;

        let mut tx = self.pool.begin().await?;
        let mut user = load_user(&mut tx, id).await?;
        ensure_can_manage(&mut tx, &user, actor).await?;
        let mut changes: Vec<(&'static str, Option<String>, Option<String>)> = Vec::new();

        if let Some(email) = req.email.map(|e| e.trim().to_string()) {
            if email != user.email {
                changes.push(("email", Some(user.email.clone()), Some(email.clone())));
                user.email = email;
            }
        }
        if let Some(full_name) = req.full_name.map(|n| n.trim().to_string()) {
            if full_name != user.full_name {
                changes.push(("full_name", Some(user.full_name.clone()), Some(full_name.clone())));
                user.full_name = full_name;
            }
        }
        if let Some(is_admin) = req.is_admin {
            if is_admin != user.is_admin {
                if !is_admin && id == actor {
                    return Err(AppError::conflict("You cannot revoke your own administrator flag"));
                }
                changes.push((
                    "is_admin",
                    Some(user.is_admin.to_string()),
                    Some(is_admin.to_string()),
                ));
                user.is_admin = is_admin;
            }
        }
        if let Some(password) = req.password {
            check_password(&password, self.password_min_length).map_err(AppError::BadRequest)?;
            user.password_hash = AuthService::hash_password(&password)?;
            // Hashes never go to the history
            changes.push(("password", None, None));
        }

        if changes.is_empty() {
            debug!(user_id = %id, "User update without changes");
            return self.with_role_name(user).await;
        }

        UserRepository::update_profile(&mut tx, &user).await?;
        for (field, old, new) in changes.iter().cloned() {
            HistoryRepository::record(
                &mut *tx,
                &NewHistoryEntry::user(id, HistoryAction::Updated)
                    .change(field, old, new)
                    .actor(Some(actor)),
            )
            .await?;
        }
        let user = load_user(&mut tx, id).await?;
        tx.commit().await?;

        info!(user_id = %id, fields = changes.len(), actor = %actor, "User updated");
        self.with_role_name(user).await
    }

    /// Move a user to another role, recording the transition
    pub async fn change_role(&self, id: Uuid, req: ChangeRoleRequest, actor: Uuid) -> AppResult<UserPublic> {
        req.validate()?;

        let mut tx = self.pool.begin().await?;
        let user = load_user(&mut tx, id).await?;
        ensure_can_manage(&mut tx, &user, actor).await?;

        let target = db::role_repository::find_by_id(&mut *tx, req.role_id)
            .await?
            .ok_or_else(|| AppError::bad_request(format!("Role {} not found", req.role_id)))?;
        if !target.active {
            return Err(AppError::bad_request(format!("Role '{}' is inactive", target.name)));
        }

        if user.role_id == target.id {
            debug!(user_id = %id, role = %target.name, "Role unchanged");
            return Ok(UserPublic::from(user).with_role_name(target.name));
        }

        apply_role_change(&mut tx, &user, &target, Some(actor), req.comment).await?;
        let user = load_user(&mut tx, id).await?;
        tx.commit().await?;

        info!(user_id = %id, role = %target.name, actor = %actor, "User role changed");
        Ok(UserPublic::from(user).with_role_name(target.name))
    }

    /// Deactivate a user and unassign their open reports
    pub async fn deactivate_user(&self, id: Uuid, req: DeactivateRequest, actor: Uuid) -> AppResult<CascadeSummary> {
        req.validate()?;
        if id == actor {
            return Err(AppError::conflict("You cannot deactivate your own account"));
        }

        let mut tx = self.pool.begin().await?;
        let user = load_user(&mut tx, id).await?;
        ensure_can_manage(&mut tx, &user, actor).await?;

        if !user.active {
            debug!(user_id = %id, "User already inactive");
            return Ok(CascadeSummary {
                entity_id: id,
                affected: 0,
                replacement_id: None,
            });
        }

        let comment = format!("User '{}' deactivated", user.username);
        let mut affected = 0;
        for report_id in ReportRepository::open_ids_assigned_to(&mut tx, id).await? {
            let report = load_report(&mut tx, report_id).await?;
            apply_unassign(&mut tx, &report, Some(actor), Some(comment.clone())).await?;
            affected += 1;
        }

        UserRepository::set_active(&mut tx, id, false).await?;
        HistoryRepository::record(
            &mut *tx,
            &NewHistoryEntry::user(id, HistoryAction::Deactivated)
                .comment(req.comment)
                .actor(Some(actor)),
        )
        .await?;
        tx.commit().await?;

        info!(user_id = %id, username = %user.username, affected, actor = %actor, "User deactivated");
        Ok(CascadeSummary {
            entity_id: id,
            affected,
            replacement_id: None,
        })
    }

    pub async fn activate_user(&self, id: Uuid, actor: Uuid) -> AppResult<UserPublic> {
        let mut tx = self.pool.begin().await?;
        let user = load_user(&mut tx, id).await?;
        ensure_can_manage(&mut tx, &user, actor).await?;
        if user.active {
            debug!(user_id = %id, "User already active");
            return self.with_role_name(user).await;
        }

        let role = db::role_repository::find_by_id(&mut *tx, user.role_id).await?;
        if !role.map(|r| r.active).unwrap_or(false) {
            return Err(AppError::conflict(
                "The user's role is inactive; change the role before activating",
            ));
        }

        UserRepository::set_active(&mut tx, id, true).await?;
        HistoryRepository::record(
            &mut *tx,
            &NewHistoryEntry::user(id, HistoryAction::Activated).actor(Some(actor)),
        )
        .await?;
        let user = load_user(&mut tx, id).await?;
        tx.commit().await?;

        info!(user_id = %id, actor = %actor, "User activated");
        self.with_role_name(user).await
    }

    pub async fn user_history(&self, id: Uuid) -> AppResult<Vec<HistoryEntry>> {
        Ok(HistoryRepository::new(&self.pool)
            .for_entity(EntityType::User, id)
            .await?)
    }

    // ---------------------------------------------------------------------
    // Roles
    // ---------------------------------------------------------------------

    pub async fn list_roles(&self, include_inactive: bool) -> AppResult<Vec<Role>> {
        Ok(RoleRepository::new(&self.pool).list(include_inactive).await?)
    }

    pub async fn get_role(&self, id: Uuid) -> AppResult<Role> {
        RoleRepository::new(&self.pool)
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Role {} not found", id)))
    }

    pub async fn create_role(&self, req: CreateRoleRequest, actor: Uuid) -> AppResult<Role> {
        req.validate()?;

        let mut tx = self.pool.begin().await?;
        let role = RoleRepository::create(&mut tx, &req).await?;
        HistoryRepository::record(
            &mut *tx,
            &NewHistoryEntry::new(EntityType::Role, role.id, HistoryAction::Created)
                .change("name", None::<String>, Some(role.name.as_str()))
                .actor(Some(actor)),
        )
        .await?;
        tx.commit().await?;

        info!(role_id = %role.id, role = %role.name, actor = %actor, "Role created");
        Ok(role)
    }

    pub async fn update_role(&self, id: Uuid, req: UpdateRoleRequest, actor: Uuid) -> AppResult<Role> {
        req.validate()?;

        let mut tx = self.pool.begin().await?;
        let mut role = load_role(&mut tx, id).await?;
        let mut changes: Vec<(&'static str, Option<String>, Option<String>)> = Vec::new();

        if let Some(name) = req.name {
            if name != role.name {
                if role.is_system {
                    return Err(AppError::conflict("System roles cannot be renamed"));
                }
                changes.push(("name", Some(role.name.clone()), Some(name.clone())));
                role.name = name;
            }
        }
        if let Some(display_name) = req.display_name {
            if display_name != role.display_name {
                changes.push(("display_name", Some(role.display_name.clone()), Some(display_name.clone())));
                role.display_name = display_name;
            }
        }
        if req.description.is_some() && req.description != role.description {
            changes.push(("description", role.description.clone(), req.description.clone()));
            role.description = req.description;
        }
        if let Some(permissions) = req.permissions {
            if permissions != role.permissions {
                changes.push((
                    "permissions",
                    Some(join_permissions(&role.permissions)),
                    Some(join_permissions(&permissions)),
                ));
                role.permissions = permissions;
            }
        }

        if changes.is_empty() {
            debug!(role_id = %id, "Role update without changes");
            return Ok(role);
        }

        RoleRepository::update(&mut tx, &role).await?;
        for (field, old, new) in changes {
            HistoryRepository::record(
                &mut *tx,
                &NewHistoryEntry::new(EntityType::Role, id, HistoryAction::Updated)
                    .change(field, old, new)
                    .actor(Some(actor)),
            )
            .await?;
        }

        let role = load_role(&mut tx, id).await?;
        tx.commit().await?;

        info!(role_id = %id, role = %role.name, actor = %actor, "Role updated");
        Ok(role)
    }

    /// Delete a custom role nobody holds
    pub async fn delete_role(&self, id: Uuid, actor: Uuid) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        let role = load_role(&mut tx, id).await?;

        if role.is_system {
            return Err(AppError::conflict("System roles cannot be deleted"));
        }
        if !RoleRepository::delete_unused(&mut tx, id).await? {
            let members = RoleRepository::count_users(&mut tx, id).await?;
            return Err(AppError::conflict(format!(
                "Role '{}' is held by {} user(s); deactivate it with a replacement instead",
                role.name, members
            )));
        }

        HistoryRepository::record(
            &mut *tx,
            &NewHistoryEntry::new(EntityType::Role, id, HistoryAction::Deleted)
                .change("name", Some(role.name.as_str()), None::<String>)
                .actor(Some(actor)),
        )
        .await?;
        tx.commit().await?;

        info!(role_id = %id, role = %role.name, actor = %actor, "Role deleted");
        Ok(())
    }

    /// Deactivate a role, moving its members to the replacement or to the
    /// configured default role
    pub async fn deactivate_role(&self, id: Uuid, req: DeactivateRequest, actor: Uuid) -> AppResult<CascadeSummary> {
        req.validate()?;

        let mut tx = self.pool.begin().await?;
        let role = load_role(&mut tx, id).await?;

        if role.is_system {
            return Err(AppError::conflict("System roles cannot be deactivated"));
        }
        if !role.active {
            debug!(role_id = %id, "Role already inactive");
            return Ok(CascadeSummary {
                entity_id: id,
                affected: 0,
                replacement_id: None,
            });
        }

        let target = match req.replacement_id {
            Some(replacement_id) => {
                if replacement_id == id {
                    return Err(AppError::conflict("A role cannot replace itself"));
                }
                let target = db::role_repository::find_by_id(&mut *tx, replacement_id)
                    .await?
                    .ok_or_else(|| AppError::bad_request(format!("Role {} not found", replacement_id)))?;
                if !target.active {
                    return Err(AppError::conflict(format!(
                        "Replacement role '{}' is inactive",
                        target.name
                    )));
                }
                target
            }
            None => {
                let target = self.default_role_in(&mut tx).await?;
                if target.id == id {
                    return Err(AppError::conflict(
                        "The default role can only be deactivated with a replacement",
                    ));
                }
                target
            }
        };

        let comment = format!("Role '{}' deactivated", role.name);
        let mut affected = 0;
        for user_id in UserRepository::ids_with_role(&mut tx, id).await? {
            let user = load_user(&mut tx, user_id).await?;
            apply_role_change(&mut tx, &user, &target, Some(actor), Some(comment.clone())).await?;
            affected += 1;
        }

        RoleRepository::set_active(&mut tx, id, false).await?;
        HistoryRepository::record(
            &mut *tx,
            &NewHistoryEntry::new(EntityType::Role, id, HistoryAction::Deactivated)
                .change("replacement", None::<String>, Some(target.name.as_str()))
                .comment(req.comment)
                .actor(Some(actor)),
        )
        .await?;
        tx.commit().await?;

        info!(
            role_id = %id,
            role = %role.name,
            replacement = %target.name,
            affected,
            actor = %actor,
            "Role deactivated"
        );

        Ok(CascadeSummary {
            entity_id: id,
            affected,
            replacement_id: Some(target.id),
        })
    }

    pub async fn activate_role(&self, id: Uuid, actor: Uuid) -> AppResult<Role> {
        let mut tx = self.pool.begin().await?;
        let role = load_role(&mut tx, id).await?;
        if role.active {
            return Ok(role);
        }

        RoleRepository::set_active(&mut tx, id, true).await?;
        HistoryRepository::record(
            &mut *tx,
            &NewHistoryEntry::new(EntityType::Role, id, HistoryAction::Activated).actor(Some(actor)),
        )
        .await?;
        tx.commit().await?;

        info!(role_id = %id, role = %role.name, actor = %actor, "Role activated");
        self.get_role(id).await
    }

    async fn default_role_in(&self, conn: &mut SqliteConnection) -> AppResult<Role> {
        let role = sqlx::query_scalar::<_, String>("SELECT id FROM roles WHERE name = ?")
            .bind(&self.default_role)
            .fetch_optional(&mut *conn)
            .await?;
        let role = match role {
            Some(id) => db::role_repository::find_by_id(&mut *conn, db::parse_uuid(&id)).await?,
            None => None,
        };

        match role {
            Some(role) if role.active => Ok(role),
            _ => Err(AppError::conflict(format!(
                "Default role '{}' is missing or inactive",
                self.default_role
            ))),
        }
    }

    async fn with_role_name(&self, user: User) -> AppResult<UserPublic> {
        let role = RoleRepository::new(&self.pool).get_by_id(user.role_id).await?;
        let public = UserPublic::from(user);
        Ok(match role {
            Some(role) => public.with_role_name(role.name),
            None => public,
        })
    }
}

async fn load_user(conn: &mut SqliteConnection, id: Uuid) -> AppResult<User> {
    db::user_repository::find_by_id(conn, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("User {} not found", id)))
}

async fn load_role(conn: &mut SqliteConnection, id: Uuid) -> AppResult<Role> {
    db::role_repository::find_by_id(conn, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Role {} not found", id)))
}

/// Administrator accounts can only be managed by administrators
async fn ensure_can_manage(conn: &mut SqliteConnection, target: &User, actor: Uuid) -> AppResult<()> {
    if !target.is_admin || target.id == actor {
        return Ok(());
    }
    let actor_is_admin = db::user_repository::find_by_id(conn, actor)
        .await?
        .map(|u| u.is_admin)
        .unwrap_or(false);
    if actor_is_admin {
        Ok(())
    } else {
        Err(AppError::forbidden("Only administrators can manage administrator accounts"))
    }
}

async fn active_role(conn: &mut SqliteConnection, id: Uuid) -> AppResult<Role> {
    let role = db::role_repository::find_by_id(conn, id)
        .await?
        .ok_or_else(|| AppError::bad_request(format!("Role {} not found", id)))?;
    if !role.active {
        return Err(AppError::bad_request(format!("Role '{}' is inactive", role.name)));
    }
    Ok(role)
}

/// Move `user` to `target`, recording `role_changed` with the role names
async fn apply_role_change(
    conn: &mut SqliteConnection,
    user: &User,
    target: &Role,
    actor: Option<Uuid>,
    comment: Option<String>,
) -> AppResult<()> {
    let current = db::role_repository::find_by_id(&mut *conn, user.role_id).await?;

    UserRepository::set_role(conn, user.id, target.id).await?;
    HistoryRepository::record(
        &mut *conn,
        &NewHistoryEntry::user(user.id, HistoryAction::RoleChanged)
            .change("role", current.map(|r| r.name), Some(target.name.as_str()))
            .comment(comment)
            .actor(actor),
    )
    .await?;
    Ok(())
}

fn join_permissions(permissions: &[crate::models::Permission]) -> String {
    permissions
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
