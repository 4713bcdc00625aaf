//! Request normalization: one canonical policy for the extended-reasoning
//! configuration plus assembly of the final Bedrock invocation body.
//!
//! The backend enforces hard invariants on reasoning requests (budget below
//! the output ceiling, minimum ceiling of 1024, no `top_p`), so every inbound
//! request passes through here before dispatch, whichever endpoint it came in
//! on. Malformed numeric input never fails a request; it falls back to
//! documented defaults.

use serde_json::Value;
use tracing::{debug, info, warn};

use super::models::{BackendMessage, CompletionRequest, InvocationRequest, ThinkingConfig};
use super::models::ANTHROPIC_VERSION;
use crate::proxy::config::ProxyConfig;

/// Budget used when a client-supplied value cannot be coerced to an integer.
pub const FALLBACK_THINKING_BUDGET: u32 = 4000;

/// Smallest reasoning budget the backend accepts.
pub const MIN_THINKING_BUDGET: u32 = 1024;

/// Smallest output ceiling the backend accepts for reasoning requests.
pub const MIN_THINKING_MAX_TOKENS: u32 = 1024;

/// Output ceiling above which the 128K output beta becomes relevant.
const EXTENDED_OUTPUT_THRESHOLD: u32 = 64_000;

const EXTENDED_OUTPUT_BETA: &str = "output-128k-2025-02-19";
const COMPUTER_USE_BETA: &str = "computer_20250212";

/// Invocation body plus the facts downstream translation needs.
#[derive(Debug, Clone)]
pub struct NormalizedInvocation {
    pub body: InvocationRequest,
    /// Whether reasoning ended up enabled; gates thinking extraction on the
    /// response side.
    pub thinking_enabled: bool,
}

/// Reasoning plan for one request: the (possibly adjusted) output ceiling and
/// the thinking configuration, if reasoning is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThinkingPlan {
    pub max_tokens: u32,
    pub thinking: Option<ThinkingConfig>,
}

/// Resolve whether reasoning is on for this request.
///
/// An explicit `thinking: false` always wins; an explicit `true` or a
/// configuration object enables it; otherwise the alias capability decides.
fn thinking_requested(thinking: Option<&Value>, thinking_capable: bool) -> bool {
    match thinking {
        Some(Value::Bool(false)) => false,
        Some(Value::Bool(true)) | Some(Value::Object(_)) => true,
        _ => thinking_capable,
    }
}

/// Coerce a client-supplied budget value to an integer. Floats truncate,
/// numeric strings parse; anything else is a coercion failure.
fn coerce_budget(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                u32::try_from(u).ok()
            } else {
                n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u32)
            }
        },
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
}

/// Explicit budget from the request, if any field supplies one.
///
/// Precedence: the `thinking` object's `budget_tokens`, then the convenience
/// fields `max_thinking_tokens`, `thinking_max_tokens`, `max_thinking_length`.
/// A present-but-malformed value falls back to [`FALLBACK_THINKING_BUDGET`].
fn explicit_budget(req: &CompletionRequest) -> Option<u32> {
    if let Some(Value::Object(obj)) = &req.thinking {
        if let Some(raw) = obj.get("budget_tokens") {
            return Some(coerce_budget(raw).unwrap_or_else(|| {
                warn!("invalid thinking budget_tokens {:?}, using {}", raw, FALLBACK_THINKING_BUDGET);
                FALLBACK_THINKING_BUDGET
            }));
        }
    }
    for raw in [&req.max_thinking_tokens, &req.thinking_max_tokens, &req.max_thinking_length]
        .into_iter()
        .flatten()
    {
        if raw.is_null() {
            continue;
        }
        return Some(coerce_budget(raw).unwrap_or_else(|| {
            warn!("invalid thinking budget {:?}, using {}", raw, FALLBACK_THINKING_BUDGET);
            FALLBACK_THINKING_BUDGET
        }));
    }
    None
}

/// 80% of the output ceiling, rounded down.
fn scaled_budget(max_tokens: u32) -> u32 {
    (u64::from(max_tokens) * 4 / 5) as u32
}

/// Default budget when the client supplies none:
/// `max(1024, min(floor(0.8 * max_tokens), max_tokens - 1))`.
fn default_budget(max_tokens: u32) -> u32 {
    scaled_budget(max_tokens).min(max_tokens.saturating_sub(1)).max(MIN_THINKING_BUDGET)
}

/// Compute the reasoning plan for one request.
///
/// Canonical policy, applied in order:
/// 1. enablement (explicit flag beats alias capability),
/// 2. budget: explicit value (coerced, fallback 4000) or the 0.8 default,
///    clamped to >= 1024, then reset to 80% of the ceiling if it would reach
///    the ceiling,
/// 3. raise the output ceiling to 1024 if reasoning left it below.
pub fn normalize_thinking(
    req: &CompletionRequest,
    thinking_capable: bool,
    max_tokens: u32,
) -> ThinkingPlan {
    if !thinking_requested(req.thinking.as_ref(), thinking_capable) {
        return ThinkingPlan { max_tokens, thinking: None };
    }

    let mut budget = explicit_budget(req).unwrap_or_else(|| default_budget(max_tokens));
    budget = budget.max(MIN_THINKING_BUDGET);
    if budget >= max_tokens {
        budget = scaled_budget(max_tokens);
        warn!(
            "thinking budget must stay below max_tokens ({}), reset to 80%: {} tokens",
            max_tokens, budget
        );
    }

    let max_tokens = if max_tokens < MIN_THINKING_MAX_TOKENS {
        warn!(
            "reasoning requires max_tokens >= {}, raising from {}",
            MIN_THINKING_MAX_TOKENS, max_tokens
        );
        MIN_THINKING_MAX_TOKENS
    } else {
        max_tokens
    };

    info!("extended reasoning enabled, budget: {} tokens", budget);
    ThinkingPlan { max_tokens, thinking: Some(ThinkingConfig::enabled(budget)) }
}

/// Stop sequences from the OpenAI `stop` field (single string or list).
fn normalize_stop(stop: Option<&Value>) -> Option<Vec<String>> {
    let sequences: Vec<String> = match stop? {
        Value::String(s) if !s.is_empty() => vec![s.clone()],
        Value::Array(items) => {
            items.iter().filter_map(Value::as_str).map(str::to_string).collect()
        },
        _ => Vec::new(),
    };
    if sequences.is_empty() {
        None
    } else {
        Some(sequences)
    }
}

/// Beta feature flags for the Claude 3.7 family.
fn beta_features(req: &CompletionRequest, beta_capable: bool, max_tokens: u32) -> Option<Vec<String>> {
    if !beta_capable {
        return None;
    }
    let mut flags = Vec::new();
    if req.enable_extended_output && max_tokens > EXTENDED_OUTPUT_THRESHOLD {
        info!("extended output mode enabled (128K tokens)");
        flags.push(EXTENDED_OUTPUT_BETA.to_string());
    }
    if req.enable_computer_use {
        info!("computer use feature enabled");
        flags.push(COMPUTER_USE_BETA.to_string());
    }
    if flags.is_empty() {
        None
    } else {
        Some(flags)
    }
}

/// Assemble the validated invocation body for one request.
///
/// `messages` must already satisfy the endpoint's own validation (at least
/// one non-empty user message).
pub fn build_invocation(
    req: &CompletionRequest,
    messages: Vec<BackendMessage>,
    thinking_capable: bool,
    beta_capable: bool,
    config: &ProxyConfig,
) -> NormalizedInvocation {
    let requested_max = req.max_tokens.unwrap_or(config.default_max_tokens).max(1);
    let max_tokens = if requested_max > config.max_output_tokens {
        warn!(
            "requested max_tokens ({}) exceeds the supported maximum ({}), capping",
            requested_max, config.max_output_tokens
        );
        config.max_output_tokens
    } else {
        requested_max
    };

    let plan = normalize_thinking(req, thinking_capable, max_tokens);
    let thinking_enabled = plan.thinking.is_some();

    // The backend rejects top_p combined with reasoning; drop it entirely.
    let top_p = if thinking_enabled {
        if req.top_p.is_some() {
            debug!("removing top_p: incompatible with extended reasoning");
        }
        None
    } else {
        Some(req.top_p.unwrap_or(1.0))
    };

    let body = InvocationRequest {
        anthropic_version: ANTHROPIC_VERSION,
        max_tokens: plan.max_tokens,
        temperature: req.temperature.unwrap_or(1.0),
        top_p,
        messages,
        thinking: plan.thinking,
        stop_sequences: normalize_stop(req.stop.as_ref()),
        anthropic_beta: beta_features(req, beta_capable, plan.max_tokens),
    };

    NormalizedInvocation { body, thinking_enabled }
}
