//! Tenant isolation: which sites a caller may see.

use mongodb::bson::{doc, Document};

use crate::auth::models::{AuthenticatedUser, Role};
use crate::db::models::Site;
use crate::db::site_repository::SiteRepository;
use crate::error::AppError;

/// The set of sites a request is allowed to touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteScope {
    /// Every site of every tenant (super admins only).
    All,
    /// A subset of one tenant's sites.
    Tenant {
        tenant_id: String,
        site_ids: Vec<String>,
    },
}

impl SiteScope {
    pub fn contains_site(&self, site_id: &str) -> bool {
        match self {
            SiteScope::All => true,
            SiteScope::Tenant { site_ids, .. } => site_ids.iter().any(|s| s == site_id),
        }
    }

    /// Whether a record owned by `tenant_id` is visible. Records without a
    /// site are tenant-wide and visible to the whole tenant.
    pub fn admits(&self, tenant_id: &str, site_id: Option<&str>) -> bool {
        match self {
            SiteScope::All => true,
            SiteScope::Tenant {
                tenant_id: scope_tenant,
                site_ids,
            } => {
                scope_tenant == tenant_id
                    && site_id.map_or(true, |site| site_ids.iter().any(|s| s == site))
            }
        }
    }

    /// MongoDB filter for records that always carry a `site_id`.
    pub fn site_filter(&self) -> Document {
        match self {
            SiteScope::All => doc! {},
            SiteScope::Tenant { site_ids, .. } => doc! { "site_id": { "$in": site_ids } },
        }
    }

    /// MongoDB filter for records whose `site_id` may be null (tenant-wide).
    pub fn record_filter(&self) -> Document {
        match self {
            SiteScope::All => doc! {},
            SiteScope::Tenant {
                tenant_id,
                site_ids,
            } => doc! {
                "tenant_id": tenant_id,
                "$or": [
                    { "site_id": { "$in": site_ids } },
                    { "site_id": null },
                ]
            },
        }
    }
}

/// Resolve the site scope of `user`, optionally narrowed to `requested` site.
///
/// - super admin: everything, or the requested site
/// - admin: owned sites; a requested site must be owned
/// - staff: the assigned site only
pub async fn resolve_scope(
    sites: &dyn SiteRepository,
    user: &AuthenticatedUser,
    requested: Option<&str>,
) -> Result<SiteScope, AppError> {
    match user.role {
        Role::SuperAdmin => match requested {
            None => Ok(SiteScope::All),
            Some(site_id) => {
                let site = sites
                    .find_site(site_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("Site '{}' not found", site_id)))?;
                Ok(SiteScope::Tenant {
                    tenant_id: site.tenant_id,
                    site_ids: vec![site.id],
                })
            }
        },
        Role::Admin => {
            let owned: Vec<String> = sites
                .list_sites_for_tenant(&user.tenant_id)
                .await?
                .into_iter()
                .map(|s| s.id)
                .collect();

            let site_ids = match requested {
                None => owned,
                Some(site_id) if owned.iter().any(|s| s == site_id) => vec![site_id.to_string()],
                Some(site_id) => {
                    return Err(AppError::Forbidden(format!(
                        "Site '{}' is not managed by this account",
                        site_id
                    )))
                }
            };

            Ok(SiteScope::Tenant {
                tenant_id: user.tenant_id.clone(),
                site_ids,
            })
        }
        Role::Security | Role::Receptionist => {
            let assigned = user
                .site_id
                .as_deref()
                .ok_or_else(|| AppError::Forbidden("No site is assigned to this account".into()))?;

            if let Some(site_id) = requested {
                if site_id != assigned {
                    return Err(AppError::Forbidden(format!(
                        "Site '{}' is outside this account's assignment",
                        site_id
                    )));
                }
            }

            Ok(SiteScope::Tenant {
                tenant_id: user.tenant_id.clone(),
                site_ids: vec![assigned.to_string()],
            })
        }
    }
}

/// Whether `user` may act on `site`.
pub fn can_access_site(user: &AuthenticatedUser, site: &Site) -> bool {
    match user.role {
        Role::SuperAdmin => true,
        Role::Admin => site.tenant_id == user.tenant_id,
        Role::Security | Role::Receptionist => {
            site.tenant_id == user.tenant_id && user.site_id.as_deref() == Some(site.id.as_str())
        }
    }
}

/// Load a site and check it is within the caller's reach (404 / 403).
pub async fn require_site(
    sites: &dyn SiteRepository,
    user: &AuthenticatedUser,
    site_id: &str,
) -> Result<Site, AppError> {
    let site = sites
        .find_site(site_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Site '{}' not found", site_id)))?;

    if !can_access_site(user, &site) {
        return Err(AppError::Forbidden(format!(
            "Site '{}' is outside this account's tenant",
            site_id
        )));
    }

    Ok(site)
}
