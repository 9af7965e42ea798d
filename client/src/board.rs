//! The proposal board view model: what a voter sees for each proposal and which actions are
//! currently available.
//!
//! The board only ever reflects fetched chain state. After an action is confirmed the caller
//! refreshes it; nothing is mutated locally in anticipation of the program's result.

use solana_address::Address;

use crate::{
    connection::DaoConnection,
    views::{
        fetch_proposals,
        ProposalView,
    },
};

#[derive(Clone, Copy, Debug, Eq, PartialEq, strum_macros::Display)]
pub enum VotingPhase {
    NotStarted,
    Open,
    Ended,
}

/// What the board shows in a proposal's winner slot.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WinnerStatus {
    /// The program recorded a winning option.
    Decided(String),
    /// Voting has ended but no winner is recorded: either nobody has tallied yet or the tally
    /// found no votes.
    TallyPending,
    /// Voting is still open or hasn't started.
    Undetermined,
}

impl core::fmt::Display for WinnerStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            WinnerStatus::Decided(label) => f.write_str(label),
            WinnerStatus::TallyPending => f.write_str("Tally pending"),
            WinnerStatus::Undetermined => f.write_str("TBD"),
        }
    }
}

impl ProposalView {
    /// Mirrors the program's clock checks: voting is open from `start_time` through `end_time`
    /// inclusive, and tallying is allowed strictly after `end_time`.
    pub fn phase(&self, now: i64) -> VotingPhase {
        match now {
            t if t < self.proposal.start_time => VotingPhase::NotStarted,
            t if t <= self.proposal.end_time => VotingPhase::Open,
            _ => VotingPhase::Ended,
        }
    }

    pub fn can_vote(&self, now: i64, voter: &Address) -> bool {
        self.phase(now) == VotingPhase::Open && !self.proposal.has_voted(voter)
    }

    pub fn can_tally(&self, now: i64) -> bool {
        self.phase(now) == VotingPhase::Ended && self.proposal.winner_index.is_none()
    }

    pub fn winner_status(&self, now: i64) -> WinnerStatus {
        match self.proposal.winning_option() {
            Some(label) => WinnerStatus::Decided(label.to_string()),
            None if self.phase(now) == VotingPhase::Ended => WinnerStatus::TallyPending,
            None => WinnerStatus::Undetermined,
        }
    }

    /// Each option label paired with its accumulated vote weight.
    pub fn tallies(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.proposal
            .options
            .iter()
            .map(String::as_str)
            .zip(self.proposal.votes.iter().copied())
    }
}

#[derive(Debug, Default)]
pub struct ProposalBoard {
    proposals: Vec<ProposalView>,
    /// The cluster time of the last refresh.
    refreshed_at: Option<i64>,
}

impl ProposalBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the board's contents with freshly fetched chain state.
    pub async fn refresh<C: DaoConnection>(&mut self, conn: &C) -> anyhow::Result<()> {
        let (proposals, now) = futures::try_join!(fetch_proposals(conn), conn.unix_timestamp())?;
        self.proposals = proposals;
        self.refreshed_at = Some(now);
        Ok(())
    }

    pub fn proposals(&self) -> &[ProposalView] {
        &self.proposals
    }

    pub fn refreshed_at(&self) -> Option<i64> {
        self.refreshed_at
    }

    pub fn get(&self, address: &Address) -> Option<&ProposalView> {
        self.proposals.iter().find(|view| &view.address == address)
    }

    /// Proposals `voter` can still vote on at `now`.
    pub fn votable<'a>(
        &'a self,
        now: i64,
        voter: &'a Address,
    ) -> impl Iterator<Item = &'a ProposalView> + 'a {
        self.proposals
            .iter()
            .filter(move |view| view.can_vote(now, voter))
    }

    /// Proposals that have ended and still await a tally at `now`.
    pub fn awaiting_tally(&self, now: i64) -> impl Iterator<Item = &ProposalView> + '_ {
        self.proposals.iter().filter(move |view| view.can_tally(now))
    }
}

#[cfg(test)]
mod tests {
    use dao_interface::state::Proposal;

    use super::*;

    fn view(votes: Vec<u64>, winner_index: Option<u8>) -> ProposalView {
        ProposalView {
            address: Address::new_unique(),
            proposal: Proposal {
                creator: Address::new_unique(),
                title: "Treasury".to_string(),
                description: "Allocate 50%".to_string(),
                options: vec!["Yes".to_string(), "No".to_string(), "Abstain".to_string()],
                start_time: 100,
                end_time: 200,
                votes,
                voters: vec![],
                winner_index,
            },
        }
    }

    #[test]
    fn phases_follow_the_program_clock() {
        let v = view(vec![0, 0, 0], None);
        assert_eq!(v.phase(99), VotingPhase::NotStarted);
        assert_eq!(v.phase(100), VotingPhase::Open);
        assert_eq!(v.phase(200), VotingPhase::Open);
        assert_eq!(v.phase(201), VotingPhase::Ended);
        assert_eq!(VotingPhase::NotStarted.to_string(), "NotStarted");
    }

    #[test]
    fn voting_and_tallying_availability() {
        let mut v = view(vec![0, 3, 1], None);
        let voter = Address::new_unique();
        assert!(!v.can_vote(99, &voter));
        assert!(v.can_vote(150, &voter));
        assert!(!v.can_tally(200));
        assert!(v.can_tally(201));

        v.proposal.voters.push(voter);
        assert!(!v.can_vote(150, &voter));

        v.proposal.winner_index = Some(1);
        assert!(!v.can_tally(201));
    }

    #[test]
    fn winner_labels() {
        assert_eq!(
            view(vec![0, 3, 1], None).winner_status(150),
            WinnerStatus::Undetermined
        );
        assert_eq!(
            view(vec![0, 3, 1], None).winner_status(201),
            WinnerStatus::TallyPending
        );
        let decided = view(vec![0, 3, 1], Some(1)).winner_status(201);
        assert_eq!(decided, WinnerStatus::Decided("No".to_string()));
        assert_eq!(decided.to_string(), "No");
        assert_eq!(WinnerStatus::TallyPending.to_string(), "Tally pending");
        assert_eq!(WinnerStatus::Undetermined.to_string(), "TBD");
    }

    #[test]
    fn tallies_pair_options_with_votes() {
        let v = view(vec![0, 3, 1], None);
        assert_eq!(
            v.tallies().collect::<Vec<_>>(),
            [("Yes", 0), ("No", 3), ("Abstain", 1)]
        );
    }
}
