use super::users::UserDirectory;
use crate::domain::authorization::Action;
use crate::domain::identity::Identity;
use crate::domain::ports::RequestRepositoryRef;
use crate::domain::request::{
    ContentPatch, DonationRequest, DonationStatus, RequestChange, RequestDetails, RequestFilter,
    RequestId, RequestPage, SearchCriteria, Window,
};
use crate::error::{Result, ServiceError};
use chrono::Utc;
use tracing::{debug, info, warn};

/// How many requests the dashboard "recent" view shows.
pub const RECENT_LIMIT: usize = 3;

/// Donation request lifecycle.
///
/// Every mutation resolves the caller, runs the guard, and then issues one
/// conditional write so concurrent editors cannot race a status change.
#[derive(Clone)]
pub struct DonationRequestService {
    requests: RequestRepositoryRef,
    directory: UserDirectory,
}

impl DonationRequestService {
    pub fn new(requests: RequestRepositoryRef, directory: UserDirectory) -> Self {
        Self {
            requests,
            directory,
        }
    }

    pub async fn create(&self, identity: &Identity, details: RequestDetails) -> Result<RequestId> {
        self.directory
            .caller(identity)
            .await?
            .authorize(Action::CreateRequest, None)?;
        let request = DonationRequest::new(identity.email().clone(), details, Utc::now())?;
        let id = request.id;
        self.requests.insert(request).await?;
        info!(%id, requester = %identity.email(), "Created donation request");
        Ok(id)
    }

    pub async fn get(&self, identity: &Identity, id: RequestId) -> Result<DonationRequest> {
        self.directory
            .caller(identity)
            .await?
            .authorize(Action::ViewRequest, None)?;
        self.load(id).await
    }

    /// Edits content of a pending request.
    ///
    /// Absent requests are `NotFound`; callers who are neither owner nor
    /// admin are `Forbidden`; requests that have left `pending` are
    /// `Conflict` for everyone, admins included.
    pub async fn edit_content(
        &self,
        identity: &Identity,
        id: RequestId,
        patch: ContentPatch,
    ) -> Result<DonationRequest> {
        let caller = self.directory.caller(identity).await?;
        let current = self.load(id).await?;
        caller.authorize(Action::EditRequestContent, Some(&current.requester_email))?;
        ensure_pending(current.donation_status)?;
        patch.validate()?;

        let precondition = RequestFilter::status(DonationStatus::Pending);
        if !self
            .requests
            .update_where(id, &precondition, RequestChange::Content(patch))
            .await?
        {
            return Err(self.explain_miss(id).await);
        }
        info!(%id, editor = %identity.email(), "Edited donation request");
        self.load(id).await
    }

    pub async fn change_status(
        &self,
        identity: &Identity,
        id: RequestId,
        next: DonationStatus,
    ) -> Result<DonationRequest> {
        self.directory
            .caller(identity)
            .await?
            .authorize(Action::ChangeRequestStatus, None)?;
        let current = self.load(id).await?;
        current.donation_status.transition(next)?;

        let precondition = RequestFilter::status(current.donation_status);
        if !self
            .requests
            .update_where(id, &precondition, RequestChange::Status(next))
            .await?
        {
            return Err(self.explain_miss(id).await);
        }
        info!(
            %id,
            from = %current.donation_status,
            to = %next,
            by = %identity.email(),
            "Changed donation status"
        );
        self.load(id).await
    }

    pub async fn delete(&self, identity: &Identity, id: RequestId) -> Result<()> {
        let caller = self.directory.caller(identity).await?;
        let current = self.load(id).await?;
        caller.authorize(Action::DeleteRequest, Some(&current.requester_email))?;
        if !self.requests.delete(id).await? {
            return Err(not_found(id));
        }
        info!(%id, by = %identity.email(), "Deleted donation request");
        Ok(())
    }

    /// Pending requests matching every given criterion. Unpaginated.
    pub async fn search(
        &self,
        identity: &Identity,
        criteria: SearchCriteria,
    ) -> Result<Vec<DonationRequest>> {
        self.directory
            .caller(identity)
            .await?
            .authorize(Action::SearchRequests, None)?;
        let filter = criteria.into_filter();
        debug!(?filter, "Searching pending requests");
        self.requests.find(&filter, Window::ALL).await
    }

    pub async fn list_pending(&self, identity: &Identity) -> Result<Vec<DonationRequest>> {
        self.directory
            .caller(identity)
            .await?
            .authorize(Action::ListPendingRequests, None)?;
        self.requests
            .find(&RequestFilter::status(DonationStatus::Pending), Window::ALL)
            .await
    }

    /// Every request, newest first. Admins and volunteers only.
    pub async fn list_all(
        &self,
        identity: &Identity,
        status: Option<DonationStatus>,
    ) -> Result<Vec<DonationRequest>> {
        self.directory
            .caller(identity)
            .await?
            .authorize(Action::ListAllRequests, None)?;
        let filter = RequestFilter {
            status,
            ..Default::default()
        };
        self.requests.find(&filter, Window::ALL).await
    }

    /// One zero-based page of the caller's own requests, newest first.
    pub async fn list_mine(
        &self,
        identity: &Identity,
        page: usize,
        size: usize,
        status: Option<DonationStatus>,
    ) -> Result<RequestPage> {
        self.directory
            .caller(identity)
            .await?
            .authorize(Action::ViewOwnRequests, None)?;
        let window = Window::page(page, size)?;
        let filter = RequestFilter {
            requester: Some(identity.email().clone()),
            status,
            ..Default::default()
        };
        let total_request = self.requests.count(&filter).await?;
        let requests = self.requests.find(&filter, window).await?;
        Ok(RequestPage {
            requests,
            total_request,
        })
    }

    /// Donors see their own newest requests; admins and volunteers see the
    /// newest requests overall.
    pub async fn recent_for_caller(&self, identity: &Identity) -> Result<Vec<DonationRequest>> {
        let caller = self.directory.caller(identity).await?;
        caller.authorize(Action::ViewOwnRequests, None)?;
        let filter = if caller.is_elevated() {
            RequestFilter::default()
        } else {
            RequestFilter {
                requester: Some(caller.email),
                ..Default::default()
            }
        };
        self.requests
            .find(&filter, Window::first(RECENT_LIMIT))
            .await
    }

    pub async fn count(&self) -> Result<u64> {
        self.requests.count(&RequestFilter::default()).await
    }

    async fn load(&self, id: RequestId) -> Result<DonationRequest> {
        self.requests.get(id).await?.ok_or_else(|| not_found(id))
    }

    /// A conditional write matched nothing: tell "gone" apart from "moved on".
    async fn explain_miss(&self, id: RequestId) -> ServiceError {
        match self.requests.get(id).await {
            Ok(None) => not_found(id),
            Ok(Some(current)) => {
                warn!(%id, status = %current.donation_status, "Lost a race on a status-gated write");
                ServiceError::Conflict(format!(
                    "Request {} is {} and was not updated",
                    id, current.donation_status
                ))
            }
            Err(e) => e,
        }
    }
}

fn ensure_pending(status: DonationStatus) -> Result<()> {
    if status == DonationStatus::Pending {
        Ok(())
    } else {
        Err(ServiceError::Conflict(format!(
            "Only pending requests can be edited; this one is {}",
            status
        )))
    }
}

fn not_found(id: RequestId) -> ServiceError {
    ServiceError::NotFound(format!("donation request {}", id))
}
