// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Scoring existing stacks against requested transport parameters, so two
// consumers needing the same parameters share one stack instead of opening
// a duplicate connection.

use crate::port::PortRef;

/// What a query requires of one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Constraint {
    /// The query does not care.
    #[default]
    Unconstrained,
    /// Some module must claim the parameter with exactly this value.
    Value(u64),
    /// Some module must claim the parameter; any value will do.
    Any,
    /// No module may claim the parameter.
    Exclude,
}

/// One parameter of a query plus the result of the last match run.
#[derive(Clone, Default)]
pub struct MatchParam {
    constraint: Constraint,
    claimed: bool,
    matched_by: Option<PortRef>,
}

impl MatchParam {
    pub fn new(constraint: Constraint) -> Self {
        Self {
            constraint,
            ..Self::default()
        }
    }

    pub fn constraint(&self) -> Constraint {
        self.constraint
    }

    pub fn set(&mut self, constraint: Constraint) {
        self.constraint = constraint;
    }

    pub fn require(&mut self, value: u64) {
        self.constraint = Constraint::Value(value);
    }

    pub fn require_any(&mut self) {
        self.constraint = Constraint::Any;
    }

    pub fn exclude(&mut self) {
        self.constraint = Constraint::Exclude;
    }

    /// Whether this parameter counts toward `requested_matches`.
    pub fn is_requested(&self) -> bool {
        self.constraint != Constraint::Unconstrained
    }

    /// Record that the port `by` implements this parameter, with `value` if
    /// the parameter carries one. Returns the score earned (0 or 1); a
    /// parameter is scored at most once per run.
    pub fn claim(&mut self, value: Option<u64>, by: &PortRef) -> usize {
        self.claimed = true;
        if self.matched_by.is_some() {
            return 0;
        }
        let hit = match self.constraint {
            Constraint::Value(want) => value == Some(want),
            Constraint::Any => true,
            Constraint::Unconstrained | Constraint::Exclude => false,
        };
        if !hit {
            return 0;
        }
        self.matched_by = Some(PortRef::clone(by));
        1
    }

    /// Whether any port claimed the parameter during the last run.
    pub fn is_claimed(&self) -> bool {
        self.claimed
    }

    /// The port that satisfied the constraint during the last run.
    pub fn matched_by(&self) -> Option<&PortRef> {
        self.matched_by.as_ref()
    }

    /// Excluded and never claimed: absence satisfies the exclusion.
    fn exclusion_met(&self) -> bool {
        self.constraint == Constraint::Exclude && !self.claimed
    }

    fn reset(&mut self) {
        self.claimed = false;
        self.matched_by = None;
    }
}

impl std::fmt::Debug for MatchParam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let by = self
            .matched_by
            .as_ref()
            .and_then(|p| p.proto_mod())
            .map(|m| m.name().to_owned());
        f.debug_struct("MatchParam")
            .field("constraint", &self.constraint)
            .field("claimed", &self.claimed)
            .field("matched_by", &by)
            .finish()
    }
}

/// A stack-match query.
#[derive(Debug, Clone, Default)]
pub struct ProtoPortMatchParams {
    pub udp_dest_port: MatchParam,
    pub srp_version: MatchParam,
    pub srp_vc: MatchParam,
    /// Stream tag.
    pub tdest: MatchParam,
    /// Presence of a reliability layer.
    pub have_rssi: MatchParam,
    /// Presence of a depacketizer.
    pub have_depack: MatchParam,
}

impl ProtoPortMatchParams {
    pub fn new() -> Self {
        Self::default()
    }

    fn all(&self) -> [&MatchParam; 6] {
        [
            &self.udp_dest_port,
            &self.srp_version,
            &self.srp_vc,
            &self.tdest,
            &self.have_rssi,
            &self.have_depack,
        ]
    }

    fn all_mut(&mut self) -> [&mut MatchParam; 6] {
        [
            &mut self.udp_dest_port,
            &mut self.srp_version,
            &mut self.srp_vc,
            &mut self.tdest,
            &mut self.have_rssi,
            &mut self.have_depack,
        ]
    }

    /// Highest score a candidate can reach.
    pub fn requested_matches(&self) -> usize {
        self.all().iter().filter(|p| p.is_requested()).count()
    }

    /// One point per excluded parameter no port claimed.
    pub fn excluded(&self) -> usize {
        self.all().iter().filter(|p| p.exclusion_met()).count()
    }

    /// Forget the results of the previous run; constraints are kept.
    pub fn reset(&mut self) {
        for p in self.all_mut() {
            p.reset();
        }
    }

    /// Score the stack below (and including) `port`.
    pub fn find_matches(&mut self, port: &PortRef) -> usize {
        self.reset();
        let n = port.match_params(self);
        n + self.excluded()
    }

    /// Whether the stack below `port` satisfies every constraint.
    pub fn is_full_match(&mut self, port: &PortRef) -> bool {
        self.find_matches(port) == self.requested_matches()
    }
}
