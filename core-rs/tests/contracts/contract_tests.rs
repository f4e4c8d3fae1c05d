//! Contract Tests - Authorization Invariant Protection
//!
//! This file aggregates all contract test modules.
//! Contract tests verify invariants that MUST NEVER BREAK.

// Contract test modules
mod contracts {
    // Layered evaluation contracts
    mod evaluator {
        include!("evaluator_contracts.rs");
    }

    // Role ordering contracts
    mod role_level {
        include!("role_level_contracts.rs");
    }

    // Provider lifecycle contracts
    mod provider {
        include!("provider_contracts.rs");
    }
}
