#![allow(dead_code)]

use chrono::{NaiveDate, NaiveTime};
use redcell::application::{App, Stores};
use redcell::config::CheckoutConfig;
use redcell::domain::identity::{Email, Identity};
use redcell::domain::request::RequestDetails;
use redcell::domain::user::{Profile, Role};
use redcell::infrastructure::gateway::InMemoryGateway;
use redcell::infrastructure::identity::StaticTokenProvider;
use std::sync::Arc;

/// An in-memory app plus handles on the test doubles behind it.
pub struct Harness {
    pub app: App,
    pub tokens: StaticTokenProvider,
    pub gateway: InMemoryGateway,
}

impl Harness {
    pub fn new() -> Self {
        let tokens = StaticTokenProvider::new();
        let gateway = InMemoryGateway::new();
        let app = App::new(
            Stores::in_memory(),
            Arc::new(tokens.clone()),
            Arc::new(gateway.clone()),
            CheckoutConfig::default(),
        );
        Self {
            app,
            tokens,
            gateway,
        }
    }

    /// Issues a token for `email` and returns the identity it resolves to.
    pub async fn sign_in(&self, email: &str) -> Identity {
        let email = Email::parse(email).unwrap();
        let token = format!("token-{}", email);
        self.tokens.issue(token.clone(), email).await;
        self.app.authenticate(&token).await.unwrap()
    }

    /// Signs in and registers `email` as an active donor.
    pub async fn donor(&self, email: &str) -> Identity {
        let identity = self.sign_in(email).await;
        self.app
            .users
            .register(&identity, profile(email))
            .await
            .unwrap();
        identity
    }

    /// Registers `email` and promotes it to `role` through `admin`.
    pub async fn with_role(&self, admin: &Identity, email: &str, role: Role) -> Identity {
        let identity = self.donor(email).await;
        self.app
            .users
            .set_role(admin, identity.email(), role)
            .await
            .unwrap();
        identity
    }

    /// Registers `email` and makes it the first admin.
    pub async fn admin(&self, email: &str) -> Identity {
        let identity = self.donor(email).await;
        self.app
            .users
            .bootstrap_admin(identity.email())
            .await
            .unwrap();
        identity
    }
}

pub fn profile(email: &str) -> Profile {
    Profile {
        name: email.split('@').next().unwrap_or("donor").to_string(),
        blood_group: Some("O+".to_string()),
        ..Default::default()
    }
}

pub fn details(blood_group: &str, district: &str, upazila: &str) -> RequestDetails {
    RequestDetails {
        blood_group: blood_group.to_string(),
        requester_district: district.to_string(),
        requester_upazila: upazila.to_string(),
        hospital_name: "Dhaka Medical College".to_string(),
        full_address: "Secretariat Rd, Dhaka".to_string(),
        donation_date: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
        donation_time: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
        request_message: String::new(),
    }
}
