//! Team membership index and repository ownership attribution.
//!
//! The membership index is fetched at most once per crawl, on the first ownership
//! computation, then shared read-only by every repository processed afterwards.
//!
//! Platform calls made for one repository are issued one after the other, never concurrently.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::contract::SourceControlClient;
use crate::error::SourceControlError;
use crate::model::{DetailedCommit, Team, TeamMember};

pub const UNDEFINED_OWNER: &str = "Undefined";

/// `login -> team names`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Membership {
    teams_by_login: HashMap<String, BTreeSet<String>>,
}

impl Membership {
    pub fn add(&mut self, team: &Team, members: &[TeamMember]) {
        for member in members {
            self.teams_by_login
                .entry(member.login.clone())
                .or_default()
                .insert(team.name.clone());
        }
    }

    /// Teams of `login`; a login belonging to no team is its own pseudo-team.
    pub fn teams_of(&self, login: &str) -> BTreeSet<String> {
        self.teams_by_login
            .get(login)
            .cloned()
            .unwrap_or_else(|| BTreeSet::from([login.to_string()]))
    }

    pub fn is_empty(&self) -> bool {
        self.teams_by_login.is_empty()
    }
}

pub struct MembershipResolver {
    client: Arc<dyn SourceControlClient>,
    organization: String,
    excluded_teams: BTreeSet<String>,
    membership: OnceCell<Membership>,
}

impl MembershipResolver {
    pub fn new(
        client: Arc<dyn SourceControlClient>,
        organization: impl Into<String>,
        excluded_teams: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            client,
            organization: organization.into(),
            excluded_teams: excluded_teams.into_iter().collect(),
            membership: OnceCell::new(),
        }
    }

    /// Fetches every team of the organization, except the excluded ones, and their members.
    pub async fn compute_membership(&self) -> Result<Membership, SourceControlError> {
        let teams: Vec<Team> = self
            .client
            .fetch_teams(&self.organization)
            .await?
            .into_iter()
            .filter(|t| !self.excluded_teams.contains(&t.name))
            .collect();
        debug!(organization = %self.organization, nb_teams = teams.len(), "fetched teams");

        // one platform call at a time
        let members: Vec<Vec<TeamMember>> = stream::iter(&teams)
            .then(|team| self.client.fetch_teams_members(&team.id))
            .try_collect()
            .await?;

        let mut membership = Membership::default();
        for (team, members) in teams.iter().zip(members) {
            debug!(team = %team.name, nb_members = members.len(), "fetched team members");
            membership.add(team, &members);
        }
        Ok(membership)
    }

    /// The membership index, computed on first call. Concurrent first callers share one fetch.
    pub async fn membership(&self) -> Result<&Membership, SourceControlError> {
        self.membership
            .get_or_try_init(|| self.compute_membership())
            .await
    }

    /// The team whose members changed the most lines over the last `last_commit_count`
    /// commits. Ties go to the alphabetically first team.
    pub async fn compute_ownership_for(
        &self,
        full_name: &str,
        last_commit_count: usize,
    ) -> Result<String, SourceControlError> {
        let membership = self.membership().await?;
        if membership.is_empty() {
            info!(repo = full_name, "Membership is empty, unable to compute repository owner");
            return Ok(UNDEFINED_OWNER.to_string());
        }

        let commits = self.client.fetch_commits(full_name, last_commit_count).await?;
        let detailed: Vec<DetailedCommit> = stream::iter(&commits)
            .then(|c| self.client.fetch_commit(full_name, &c.sha))
            .try_collect()
            .await?;
        debug!(repo = full_name, nb_commits = detailed.len(), last_commit_count, "fetched commits");

        let mut totals: BTreeMap<String, u64> = BTreeMap::new();
        for commit in &detailed {
            let Some(author) = &commit.author else {
                continue;
            };
            for team in membership.teams_of(&author.login) {
                *totals.entry(team).or_default() += commit.changed_lines;
            }
        }

        let mut owner: Option<(&String, u64)> = None;
        for (team, total) in &totals {
            if owner.map_or(true, |(_, best)| *total > best) {
                owner = Some((team, *total));
            }
        }

        Ok(owner
            .map(|(team, _)| team.clone())
            .unwrap_or_else(|| UNDEFINED_OWNER.to_string()))
    }
}
