//! Authorization gate.
//!
//! Handlers declare who may call them through their extractor type:
//! [`Authorized<R>`] requires a valid session whose account has one of the
//! roles in `R`, and [`Active<R>`] additionally requires that the account
//! was activated by an admin.

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};

use crate::error::{ApiError, ApiResult};
use crate::models::{Account, Role};
use crate::session::bearer_token;
use crate::state::SharedState;

/// A set of roles allowed through a guard.
pub trait RoleSet: Send + Sync + 'static {
    const ROLES: &'static [Role];
}

pub struct PatientOnly;
pub struct NurseOnly;
pub struct AdminOnly;
pub struct AnyRole;

impl RoleSet for PatientOnly {
    const ROLES: &'static [Role] = &[Role::Patient];
}

impl RoleSet for NurseOnly {
    const ROLES: &'static [Role] = &[Role::Nurse];
}

impl RoleSet for AdminOnly {
    const ROLES: &'static [Role] = &[Role::Admin];
}

impl RoleSet for AnyRole {
    const ROLES: &'static [Role] = &[Role::Patient, Role::Nurse, Role::Admin];
}

/// The signed-in account, checked against the role set `R`.
pub struct Authorized<R: RoleSet = AnyRole> {
    pub account: Account,
    _roles: PhantomData<R>,
}

/// Like [`Authorized`], but the account must also be active.
pub struct Active<R: RoleSet = AnyRole> {
    pub account: Account,
    _roles: PhantomData<R>,
}

/// Resolves the bearer of the request to a stored account.
fn current_account(parts: &Parts, state: &SharedState) -> ApiResult<Account> {
    let header = match parts.headers.get(AUTHORIZATION) {
        Some(value) => Some(value.to_str().map_err(|_| ApiError::Unauthenticated)?),
        None => None,
    };
    let token = bearer_token(header)?;
    let claims = state.sessions.verify(token)?;
    state
        .db
        .account(claims.sub)?
        .ok_or(ApiError::AccountNotFound)
}

fn check_role<R: RoleSet>(account: &Account) -> ApiResult<()> {
    if R::ROLES.contains(&account.role()) {
        Ok(())
    } else {
        Err(ApiError::forbidden(
            "You do not have permission to perform this action",
        ))
    }
}

impl<R: RoleSet> FromRequestParts<SharedState> for Authorized<R> {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let account = current_account(parts, state)?;
        check_role::<R>(&account)?;
        Ok(Self {
            account,
            _roles: PhantomData,
        })
    }
}

impl<R: RoleSet> FromRequestParts<SharedState> for Active<R> {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let Authorized { account, .. } =
            Authorized::<R>::from_request_parts(parts, state).await?;
        if !account.is_active {
            return Err(ApiError::AccountInactive);
        }
        Ok(Self {
            account,
            _roles: PhantomData,
        })
    }
}
