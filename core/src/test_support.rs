//! In-memory reference implementations of the external interfaces
//! (§6), shipped alongside the real facade the way the teacher ships
//! `fil_actors_runtime::test_utils::MockRuntime` next to the production
//! `Runtime` trait. Hosts standing up a first integration can wire
//! these in directly; production deployments supply their own chain
//! client, database, and HTTP gateway instead.

use std::collections::BTreeMap;

use chaoschain_runtime::interfaces::{
    Escrow, IdentityRegistry, ReputationInterface, RoleRegistry, StudioConfig, StudioConfigStore, ValidationInterface,
};
use chaoschain_runtime::{AccountId, EngineError, Hash32, RoleBits, WorkId};

/// Roles keyed by `(studio_id, account)`. Unknown accounts hold no
/// roles at all rather than erroring, so callers see a guard violation
/// from the ledger instead of a surprising interface failure.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRoleRegistry {
    roles: BTreeMap<(AccountId, AccountId), RoleBits>,
}

impl InMemoryRoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&mut self, studio_id: AccountId, account: AccountId, role: RoleBits) {
        *self.roles.entry((studio_id, account)).or_insert(RoleBits::empty()) |= role;
    }
}

impl RoleRegistry for InMemoryRoleRegistry {
    fn get_role(&self, studio_id: AccountId, account: AccountId) -> Result<RoleBits, EngineError> {
        Ok(self.roles.get(&(studio_id, account)).copied().unwrap_or(RoleBits::empty()))
    }
}

/// Per-studio scoring configuration, defaulting to [`StudioConfig::defaults`]
/// for any studio that never called `set_config`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStudioConfigStore {
    configs: BTreeMap<AccountId, StudioConfig>,
}

impl InMemoryStudioConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_config(&mut self, studio_id: AccountId, config: StudioConfig) {
        self.configs.insert(studio_id, config);
    }
}

impl StudioConfigStore for InMemoryStudioConfigStore {
    fn get_config(&self, studio_id: AccountId) -> Result<StudioConfig, EngineError> {
        Ok(self.configs.get(&studio_id).cloned().unwrap_or_else(StudioConfig::defaults))
    }
}

/// Payout alias table. `resolve_payout` never fails (§6): an agent with
/// no alias on file is simply paid at its own address.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIdentityRegistry {
    aliases: BTreeMap<AccountId, AccountId>,
}

impl InMemoryIdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_alias(&mut self, agent: AccountId, payout: AccountId) {
        self.aliases.insert(agent, payout);
    }
}

impl IdentityRegistry for InMemoryIdentityRegistry {
    fn resolve_payout(&self, agent: AccountId) -> AccountId {
        self.aliases.get(&agent).copied().unwrap_or(agent)
    }
}

/// Pull-based escrow: `release` only credits a withdrawable balance,
/// never moves funds synchronously, matching the trait's contract.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEscrow {
    balances: BTreeMap<AccountId, u128>,
    releases: Vec<(WorkId, AccountId, u128)>,
}

impl InMemoryEscrow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, recipient: AccountId) -> u128 {
        self.balances.get(&recipient).copied().unwrap_or(0)
    }

    pub fn releases(&self) -> &[(WorkId, AccountId, u128)] {
        &self.releases
    }
}

impl Escrow for InMemoryEscrow {
    fn release(&mut self, work_id: WorkId, recipient: AccountId, amount: u128) -> Result<(), EngineError> {
        let balance = self.balances.entry(recipient).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| EngineError::arithmetic(format!("escrow balance overflow crediting {recipient}")))?;
        self.releases.push((work_id, recipient, amount));
        Ok(())
    }
}

/// Records every feedback event it receives instead of publishing it
/// anywhere, for hosts wiring this crate up before a real reputation
/// gateway exists.
#[derive(Debug, Clone, Default)]
pub struct RecordingReputation {
    events: Vec<(AccountId, u8, String, String)>,
}

impl RecordingReputation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[(AccountId, u8, String, String)] {
        &self.events
    }
}

impl ReputationInterface for RecordingReputation {
    fn give_feedback(
        &mut self,
        target_agent_id: AccountId,
        score: u8,
        tag1: &str,
        tag2: &str,
        _endpoint: &str,
        _uri: &str,
        _content_hash: Hash32,
    ) -> Result<(), EngineError> {
        self.events.push((target_agent_id, score, tag1.to_string(), tag2.to_string()));
        Ok(())
    }
}

/// Records every validation-summary event it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingValidation {
    events: Vec<(Hash32, u8, String)>,
}

impl RecordingValidation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[(Hash32, u8, String)] {
        &self.events
    }
}

impl ValidationInterface for RecordingValidation {
    fn validation_response(
        &mut self,
        request_hash: Hash32,
        score: u8,
        _uri: &str,
        _hash: Hash32,
        tag: &str,
    ) -> Result<(), EngineError> {
        self.events.push((request_hash, score, tag.to_string()));
        Ok(())
    }
}
