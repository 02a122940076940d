//! Claim validation rules.
//!
//! A [`ClaimsValidator`] is an ordered list of independent rules built for
//! one token type and one set of [`ValidationOptions`]. Rules run in order
//! and the first failure is returned.

use super::claims::Claims;
use super::TokenType;
use crate::config::DEFAULT_LEEWAY;
use crate::error::InvalidTokenError;
use tracing::debug;

/// Expected values for claim validation.
#[derive(Debug, Clone)]
pub struct ValidationOptions {
    /// Expected `iss`
    pub issuer: String,

    /// Allowed audiences; the token must present at least one
    pub audience: Vec<String>,

    /// Allowed organizations; empty disables the check
    pub organization: Vec<String>,

    /// Expected `nonce`
    pub nonce: Option<String>,

    /// Maximum seconds since end-user authentication
    pub max_age: Option<i64>,

    /// Clock tolerance in seconds
    pub leeway: i64,

    /// Validation clock (Unix seconds); `None` uses the current time
    pub now: Option<i64>,
}

impl ValidationOptions {
    /// Create options for an issuer and audience list.
    pub fn new(issuer: impl Into<String>, audience: Vec<String>) -> Self {
        Self {
            issuer: issuer.into(),
            audience,
            organization: Vec::new(),
            nonce: None,
            max_age: None,
            leeway: DEFAULT_LEEWAY,
            now: None,
        }
    }

    /// Restrict to organizations.
    pub fn with_organization(mut self, organization: Vec<String>) -> Self {
        self.organization = organization;
        self
    }

    /// Require a nonce.
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Require a recent authentication.
    pub fn with_max_age(mut self, max_age: i64) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Set the clock tolerance.
    pub fn with_leeway(mut self, leeway: i64) -> Self {
        self.leeway = leeway;
        self
    }

    /// Pin the validation clock.
    pub fn with_now(mut self, now: i64) -> Self {
        self.now = Some(now);
        self
    }
}

/// Context handed to every rule.
#[derive(Debug)]
pub struct RuleContext<'a> {
    /// Expected values
    pub options: &'a ValidationOptions,

    /// Resolved validation clock
    pub now: i64,
}

/// A single claim check.
pub type Rule = fn(&Claims, &RuleContext<'_>) -> Result<(), InvalidTokenError>;

/// Ordered claim rule chain.
#[derive(Clone)]
pub struct ClaimsValidator {
    rules: Vec<(&'static str, Rule)>,
}

impl std::fmt::Debug for ClaimsValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimsValidator")
            .field("rules", &self.rule_names())
            .finish()
    }
}

impl ClaimsValidator {
    /// Build the rule chain for a token type and options.
    ///
    /// Every token is checked for issuer, audience and expiration. ID tokens
    /// add subject, issued-at and authorized party. Nonce, auth time and
    /// organization checks are added only when the options request them.
    pub fn for_token(token_type: TokenType, options: &ValidationOptions) -> Self {
        let mut rules: Vec<(&'static str, Rule)> = Vec::with_capacity(9);
        rules.push(("issuer", issuer));
        rules.push(("audience", audience));
        rules.push(("expiration", expiration));

        if token_type == TokenType::IdToken {
            rules.push(("subject", subject));
            rules.push(("issued_at", issued_at));
            rules.push(("authorized_party", authorized_party));
        }
        if options.nonce.is_some() {
            rules.push(("nonce", nonce));
        }
        if options.max_age.is_some() {
            rules.push(("auth_time", auth_time));
        }
        if !options.organization.is_empty() {
            rules.push(("organization", organization));
        }

        Self { rules }
    }

    /// Names of the rules in evaluation order.
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|(name, _)| *name).collect()
    }

    /// Run the chain, stopping at the first failure.
    pub fn validate(&self, claims: &Claims, options: &ValidationOptions) -> Result<(), InvalidTokenError> {
        let context = RuleContext {
            options,
            now: options.now.unwrap_or_else(|| chrono::Utc::now().timestamp()),
        };

        for (name, rule) in &self.rules {
            if let Err(e) = rule(claims, &context) {
                debug!(rule = *name, error = %e, "Claim validation failed");
                return Err(e);
            }
        }
        Ok(())
    }
}

/// `iss` must equal the expected issuer exactly.
pub fn issuer(claims: &Claims, ctx: &RuleContext<'_>) -> Result<(), InvalidTokenError> {
    let found = claims.issuer().ok_or(InvalidTokenError::MissingIssuer)?;
    if found != ctx.options.issuer {
        return Err(InvalidTokenError::IssuerMismatch {
            expected: ctx.options.issuer.clone(),
            found: found.to_string(),
        });
    }
    Ok(())
}

/// At least one presented audience must be allowed.
pub fn audience(claims: &Claims, ctx: &RuleContext<'_>) -> Result<(), InvalidTokenError> {
    let presented = claims
        .audience()
        .filter(|aud| !aud.is_empty())
        .ok_or(InvalidTokenError::MissingAudience)?;

    if !presented.iter().any(|aud| ctx.options.audience.contains(aud)) {
        return Err(InvalidTokenError::AudienceMismatch {
            expected: ctx.options.audience.join(","),
            found: presented.join(","),
        });
    }
    Ok(())
}

/// `exp` must be later than `now - leeway`.
pub fn expiration(claims: &Claims, ctx: &RuleContext<'_>) -> Result<(), InvalidTokenError> {
    let expires = claims.expiration().ok_or(InvalidTokenError::MissingExpiration)?;
    if expires <= ctx.now.saturating_sub(ctx.options.leeway) {
        return Err(InvalidTokenError::Expired {
            now: ctx.now,
            expires,
            leeway: ctx.options.leeway,
        });
    }
    Ok(())
}

/// `sub` must be present.
pub fn subject(claims: &Claims, _ctx: &RuleContext<'_>) -> Result<(), InvalidTokenError> {
    claims
        .subject()
        .map(|_| ())
        .ok_or(InvalidTokenError::MissingSubject)
}

/// `iat` must be present.
pub fn issued_at(claims: &Claims, _ctx: &RuleContext<'_>) -> Result<(), InvalidTokenError> {
    claims
        .issued_at()
        .map(|_| ())
        .ok_or(InvalidTokenError::MissingIssuedAt)
}

/// Multi-audience tokens must name an allowed `azp`.
pub fn authorized_party(claims: &Claims, ctx: &RuleContext<'_>) -> Result<(), InvalidTokenError> {
    let audience_count = claims.audience().map(|aud| aud.len()).unwrap_or(0);
    if audience_count <= 1 {
        return Ok(());
    }

    let azp = claims
        .authorized_party()
        .ok_or(InvalidTokenError::MissingAuthorizedParty)?;
    if !ctx.options.audience.iter().any(|aud| aud == azp) {
        return Err(InvalidTokenError::AuthorizedPartyMismatch {
            expected: ctx.options.audience.join(","),
            found: azp.to_string(),
        });
    }
    Ok(())
}

/// `nonce` must equal the nonce issued for this login.
pub fn nonce(claims: &Claims, ctx: &RuleContext<'_>) -> Result<(), InvalidTokenError> {
    let Some(expected) = ctx.options.nonce.as_deref() else {
        return Ok(());
    };
    let found = claims.nonce().ok_or(InvalidTokenError::MissingNonce)?;
    if found != expected {
        return Err(InvalidTokenError::NonceMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        });
    }
    Ok(())
}

/// `now - auth_time` must not exceed `max_age + leeway`.
pub fn auth_time(claims: &Claims, ctx: &RuleContext<'_>) -> Result<(), InvalidTokenError> {
    let Some(max_age) = ctx.options.max_age else {
        return Ok(());
    };
    let authenticated = claims.auth_time().ok_or(InvalidTokenError::MissingAuthTime)?;
    let valid_until = authenticated
        .saturating_add(max_age)
        .saturating_add(ctx.options.leeway);
    if ctx.now > valid_until {
        return Err(InvalidTokenError::AuthTimeExceeded {
            now: ctx.now,
            valid_until,
        });
    }
    Ok(())
}

/// Organization claim must be in the allowed set.
///
/// Allowed entries starting with `org_` are IDs compared exactly against
/// `org_id`; any other entry is a name compared case-insensitively against
/// `org_name`.
pub fn organization(claims: &Claims, ctx: &RuleContext<'_>) -> Result<(), InvalidTokenError> {
    let allowed = &ctx.options.organization;
    if allowed.is_empty() {
        return Ok(());
    }

    let org_id = claims.organization_id();
    let org_name = claims.organization_name();
    if org_id.is_none() && org_name.is_none() {
        return Err(InvalidTokenError::MissingOrganization);
    }

    let matched = allowed.iter().any(|entry| {
        if entry.starts_with("org_") {
            org_id == Some(entry.as_str())
        } else {
            org_name.is_some_and(|name| name.eq_ignore_ascii_case(entry))
        }
    });

    if !matched {
        return Err(InvalidTokenError::OrganizationMismatch {
            expected: allowed.join(","),
            found: org_id.or(org_name).unwrap_or_default().to_string(),
        });
    }
    Ok(())
}
