//! Connection target resolution
//!
//! Decides which branch a connect command attaches to. An explicit branch
//! argument is taken as-is, a database with a single branch auto-selects it,
//! and several branches put the choice to the operator.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use strata_api::{ApiError, Branch, Client};

use crate::prompt;

/// Target resolution errors
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("{0}")]
    Usage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No branch selected")]
    NoSelection,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fully resolved connection target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    pub organization: String,
    pub database: String,
    pub branch: String,
}

impl ConnectionTarget {
    /// Instance identifier in `org/database/branch` form
    pub fn instance(&self) -> String {
        format!("{}/{}/{}", self.organization, self.database, self.branch)
    }
}

/// Lists the branches of a database
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BranchLister: Send + Sync {
    async fn list_branches(&self, org: &str, database: &str) -> Result<Vec<Branch>, ApiError>;
}

#[async_trait]
impl BranchLister for Client {
    async fn list_branches(&self, org: &str, database: &str) -> Result<Vec<Branch>, ApiError> {
        Client::list_branches(self, org, database).await
    }
}

/// Chooses among several branches
#[async_trait]
pub trait BranchPicker: Send + Sync {
    async fn pick(&self, database: &str, branches: &[Branch]) -> Result<String, ResolveError>;
}

/// Picker that asks the operator on the terminal
pub struct TerminalPicker;

#[async_trait]
impl BranchPicker for TerminalPicker {
    async fn pick(&self, database: &str, branches: &[Branch]) -> Result<String, ResolveError> {
        prompt::select_branch(database, branches).await
    }
}

/// Resolve the branch to connect to
pub async fn resolve(
    lister: &dyn BranchLister,
    picker: &dyn BranchPicker,
    organization: &str,
    database: &str,
    branch: Option<&str>,
) -> Result<ConnectionTarget, ResolveError> {
    if organization.is_empty() {
        return Err(ResolveError::Usage(
            "An organization is required. Pass --org or set STRATA_ORG".to_string(),
        ));
    }

    if database.is_empty() {
        return Err(ResolveError::Usage(
            "A database name is required".to_string(),
        ));
    }

    let branch = match branch {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => pick_branch(lister, picker, organization, database).await?,
    };

    Ok(ConnectionTarget {
        organization: organization.to_string(),
        database: database.to_string(),
        branch,
    })
}

async fn pick_branch(
    lister: &dyn BranchLister,
    picker: &dyn BranchPicker,
    organization: &str,
    database: &str,
) -> Result<String, ResolveError> {
    let branches = lister.list_branches(organization, database).await?;

    match branches.len() {
        0 => Err(ResolveError::NotFound(format!(
            "Database {}/{} has no branches",
            organization, database
        ))),
        1 => {
            debug!("Auto-selecting the only branch '{}'", branches[0].name);
            Ok(branches[0].name.clone())
        }
        _ => picker.pick(database, &branches).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branch(name: &str) -> Branch {
        Branch {
            name: name.to_string(),
            production: false,
            ready: true,
            created_at: None,
        }
    }

    /// Picker that returns a fixed choice
    struct FixedPicker(&'static str);

    #[async_trait]
    impl BranchPicker for FixedPicker {
        async fn pick(&self, _database: &str, _branches: &[Branch]) -> Result<String, ResolveError> {
            Ok(self.0.to_string())
        }
    }

    /// Picker that fails the test when consulted
    struct NoPrompt;

    #[async_trait]
    impl BranchPicker for NoPrompt {
        async fn pick(&self, _database: &str, _branches: &[Branch]) -> Result<String, ResolveError> {
            panic!("the operator must not be prompted in this case");
        }
    }

    #[tokio::test]
    async fn test_explicit_branch_skips_listing() {
        let mut lister = MockBranchLister::new();
        lister.expect_list_branches().times(0);

        let target = resolve(&lister, &NoPrompt, "acme", "shop", Some("dev"))
            .await
            .unwrap();

        assert_eq!(target.branch, "dev");
        assert_eq!(target.instance(), "acme/shop/dev");
    }

    #[tokio::test]
    async fn test_single_branch_auto_selected() {
        let mut lister = MockBranchLister::new();
        lister
            .expect_list_branches()
            .withf(|org, database| org == "acme" && database == "shop")
            .times(1)
            .returning(|_, _| Ok(vec![branch("main")]));

        let target = resolve(&lister, &NoPrompt, "acme", "shop", None)
            .await
            .unwrap();

        assert_eq!(target.branch, "main");
    }

    #[tokio::test]
    async fn test_no_branches_is_not_found() {
        let mut lister = MockBranchLister::new();
        lister
            .expect_list_branches()
            .times(1)
            .returning(|_, _| Ok(Vec::new()));

        let result = resolve(&lister, &NoPrompt, "acme", "empty", None).await;

        assert!(matches!(result, Err(ResolveError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_multiple_branches_ask_the_picker() {
        let mut lister = MockBranchLister::new();
        lister
            .expect_list_branches()
            .times(1)
            .returning(|_, _| Ok(vec![branch("main"), branch("dev"), branch("staging")]));

        let target = resolve(&lister, &FixedPicker("dev"), "acme", "shop", None)
            .await
            .unwrap();

        assert_eq!(target.branch, "dev");
    }

    #[tokio::test]
    async fn test_empty_branch_argument_treated_as_absent() {
        let mut lister = MockBranchLister::new();
        lister
            .expect_list_branches()
            .times(1)
            .returning(|_, _| Ok(vec![branch("main")]));

        let target = resolve(&lister, &NoPrompt, "acme", "shop", Some(""))
            .await
            .unwrap();

        assert_eq!(target.branch, "main");
    }

    #[tokio::test]
    async fn test_missing_database_name_is_usage_error() {
        let mut lister = MockBranchLister::new();
        lister.expect_list_branches().times(0);

        let result = resolve(&lister, &NoPrompt, "acme", "", None).await;

        assert!(matches!(result, Err(ResolveError::Usage(_))));
    }

    #[tokio::test]
    async fn test_missing_organization_is_usage_error() {
        let mut lister = MockBranchLister::new();
        lister.expect_list_branches().times(0);

        let result = resolve(&lister, &NoPrompt, "", "shop", None).await;

        assert!(matches!(result, Err(ResolveError::Usage(_))));
    }

    #[tokio::test]
    async fn test_api_errors_propagate() {
        let mut lister = MockBranchLister::new();
        lister.expect_list_branches().times(1).returning(|_, _| {
            Err(ApiError::NotFound("Database acme/gone not found".to_string()))
        });

        let result = resolve(&lister, &NoPrompt, "acme", "gone", None).await;

        assert!(matches!(
            result,
            Err(ResolveError::Api(ApiError::NotFound(_)))
        ));
    }
}
