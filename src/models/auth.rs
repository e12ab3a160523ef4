use std::{
    fs::read,
    rc::Rc,
    str::FromStr,
    sync::OnceLock,
};

use actix_service::{self, Transform};
use actix_web::{
    dev::{Service, ServiceRequest, ServiceResponse},
    Error as ActixError, HttpMessage,
};
use chrono::Utc;
use futures::{
    future::{ready, LocalBoxFuture, Ready},
    FutureExt,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use mongodb::bson::oid::ObjectId;
use pwhash::bcrypt;
use serde::{Deserialize, Serialize};

use crate::{
    config::AuthConfig,
    error::{Error, Result as AppResult},
};

use super::{
    hospital::{Hospital, HospitalResponse},
    volunteer::{Volunteer, VolunteerResponse},
};

static KEYS: OnceLock<Keys> = OnceLock::new();

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Volunteer,
    Hospital,
}
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize)]
struct AccountClaims {
    aud: String,
    exp: i64,
    iss: String,
    sub: String,
    role: AccountKind,
    kind: TokenKind,
}

/// RS256 key pair plus the claim settings tokens are issued with.
pub struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Credential {
    pub email: String,
    pub password: String,
    pub role: AccountKind,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct RefreshRequest {
    pub rtk: String,
}
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum AccountResponse {
    Volunteer(VolunteerResponse),
    Hospital(HospitalResponse),
}
#[derive(Debug, Serialize)]
pub struct AuthenticationResponse {
    pub atk: String,
    pub rtk: String,
    pub role: AccountKind,
    pub account: AccountResponse,
}
#[derive(Debug)]
pub struct AuthenticationData {
    pub _id: ObjectId,
    pub role: AccountKind,
    pub token: String,
}
pub struct AuthenticationMiddleware<S> {
    service: Rc<S>,
}
pub struct AuthenticationMiddlewareFactory;

pub type Authentication = Rc<AuthenticationData>;

impl Keys {
    pub fn from_pem(
        private_pem: &[u8],
        public_pem: &[u8],
        config: &AuthConfig,
    ) -> AppResult<Self> {
        let encoding = EncodingKey::from_rsa_pem(private_pem)
            .map_err(|_| Error::Config("private access key is not a valid RSA PEM".to_string()))?;
        let decoding = DecodingKey::from_rsa_pem(public_pem)
            .map_err(|_| Error::Config("public access key is not a valid RSA PEM".to_string()))?;

        Ok(Self {
            encoding,
            decoding,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            access_ttl_secs: config.access_ttl_secs,
            refresh_ttl_secs: config.refresh_ttl_secs,
        })
    }
    pub fn load(config: &AuthConfig) -> AppResult<Self> {
        let private_pem = read(&config.private_key_path).map_err(|error| {
            Error::Config(format!(
                "unable to read {}: {error}",
                config.private_key_path.display()
            ))
        })?;
        let public_pem = read(&config.public_key_path).map_err(|error| {
            Error::Config(format!(
                "unable to read {}: {error}",
                config.public_key_path.display()
            ))
        })?;
        Self::from_pem(&private_pem, &public_pem, config)
    }
    pub fn issue(&self, _id: &ObjectId, role: AccountKind, kind: TokenKind) -> AppResult<String> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl_secs,
            TokenKind::Refresh => self.refresh_ttl_secs,
        };
        self.sign(_id, role, kind, ttl)
    }
    /// Access and refresh token for the account, in that order.
    pub fn issue_pair(&self, _id: &ObjectId, role: AccountKind) -> AppResult<(String, String)> {
        Ok((
            self.issue(_id, role, TokenKind::Access)?,
            self.issue(_id, role, TokenKind::Refresh)?,
        ))
    }
    pub fn verify(&self, token: &str, kind: TokenKind) -> Option<(ObjectId, AccountKind)> {
        let mut validation: Validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&self.issuer]);

        let data = decode::<AccountClaims>(token, &self.decoding, &validation).ok()?;
        if data.claims.kind != kind {
            return None;
        }
        ObjectId::from_str(&data.claims.sub)
            .ok()
            .map(|_id| (_id, data.claims.role))
    }
    fn sign(
        &self,
        _id: &ObjectId,
        role: AccountKind,
        kind: TokenKind,
        ttl: i64,
    ) -> AppResult<String> {
        let claims: AccountClaims = AccountClaims {
            sub: _id.to_hex(),
            exp: Utc::now().timestamp() + ttl,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            role,
            kind,
        };

        encode(&Header::new(Algorithm::RS256), &claims, &self.encoding).map_err(|error| {
            tracing::error!(%error, "token signing failed");
            Error::GeneratingFailed
        })
    }
}

/// Make `keys` the process-wide signing keys. Later calls are ignored.
pub fn install_keys(keys: Keys) {
    let _ = KEYS.set(keys);
}

pub fn keys() -> AppResult<&'static Keys> {
    KEYS.get().ok_or(Error::GeneratingFailed)
}

impl Credential {
    pub async fn authenticate(&self) -> AppResult<AuthenticationResponse> {
        let email = self.email.trim().to_lowercase();

        let (_id, account) = match self.role {
            AccountKind::Volunteer => {
                let volunteer = Volunteer::find_by_email(&email)
                    .await?
                    .ok_or(Error::InvalidCombination)?;
                if !bcrypt::verify(&self.password, &volunteer.password) {
                    return Err(Error::InvalidCombination);
                }
                let _id = volunteer._id.ok_or(Error::InvalidCombination)?;
                (_id, AccountResponse::Volunteer(volunteer.into()))
            }
            AccountKind::Hospital => {
                let hospital = Hospital::find_by_email(&email)
                    .await?
                    .ok_or(Error::InvalidCombination)?;
                if !bcrypt::verify(&self.password, &hospital.password) {
                    return Err(Error::InvalidCombination);
                }
                let _id = hospital._id.ok_or(Error::InvalidCombination)?;
                (_id, AccountResponse::Hospital(hospital.into()))
            }
        };

        let (atk, rtk) = keys()?.issue_pair(&_id, self.role)?;
        tracing::info!(account = %_id, role = ?self.role, "signed in");

        Ok(AuthenticationResponse {
            atk,
            rtk,
            role: self.role,
            account,
        })
    }
    pub async fn refresh(rtk: &str) -> AppResult<AuthenticationResponse> {
        let keys = keys()?;
        let (_id, role) = keys
            .verify(rtk, TokenKind::Refresh)
            .ok_or(Error::InvalidToken)?;

        let account = find_account(&_id, role).await?.ok_or(Error::InvalidToken)?;
        let (atk, rtk) = keys.issue_pair(&_id, role)?;

        Ok(AuthenticationResponse {
            atk,
            rtk,
            role,
            account,
        })
    }
}

async fn find_account(
    _id: &ObjectId,
    role: AccountKind,
) -> AppResult<Option<AccountResponse>> {
    Ok(match role {
        AccountKind::Volunteer => Volunteer::find_by_id(_id)
            .await?
            .map(|volunteer| AccountResponse::Volunteer(volunteer.into())),
        AccountKind::Hospital => Hospital::find_by_id(_id)
            .await?
            .map(|hospital| AccountResponse::Hospital(hospital.into())),
    })
}

fn bearer_token(value: &str) -> Option<&str> {
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

impl<S, B> Service<ServiceRequest> for AuthenticationMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError> + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = ActixError;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    actix_service::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv: Rc<S> = self.service.clone();

        async move {
            let token: Option<String> = req
                .headers()
                .get("Authorization")
                .and_then(|value| value.to_str().ok())
                .and_then(bearer_token)
                .map(str::to_string);

            if let (Some(token), Ok(keys)) = (token, keys()) {
                if let Some((_id, role)) = keys.verify(&token, TokenKind::Access) {
                    match find_account(&_id, role).await {
                        Ok(Some(_)) => {
                            let auth_data: AuthenticationData =
                                AuthenticationData { _id, role, token };
                            req.extensions_mut()
                                .insert::<Authentication>(Rc::new(auth_data));
                        }
                        Ok(None) => tracing::debug!(account = %_id, "token for unknown account"),
                        Err(error) => tracing::warn!(%error, "account lookup failed"),
                    }
                }
            }
            let res: ServiceResponse<B> = srv.call(req).await?;
            Ok(res)
        }
        .boxed_local()
    }
}
impl<S, B> Transform<S, ServiceRequest> for AuthenticationMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = ActixError;
    type Transform = AuthenticationMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthenticationMiddleware {
            service: Rc::new(service),
        }))
    }
}
