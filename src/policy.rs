// rule-based decisions for the heuristic player

use std::cmp::Reverse;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use tracing::debug;
use crate::action::{ActionKind, Command};
use crate::belief::BeliefTracker;
use crate::config::PolicyConfig;
use crate::error::DecisionError;
use crate::history::HistoryEvent;
use crate::role::EXCHANGE_PRIORITY;
use crate::rules::{can_block, is_responder};
use crate::simulator::{Duel, Side};
use crate::state::{GameState, Phase, Player};
use crate::threat::{self, Alliance};
use crate::transport::Oracle;
use crate::Role;

/// Everything one decision reads. Handlers take it by reference and never mutate game
/// state.
pub struct Decision<'a> {
    pub state: &'a GameState,
    pub beliefs: &'a BeliefTracker,
    pub config: &'a PolicyConfig,
    pub alliance: &'a Alliance,
    /// only present in alliance mode
    pub oracle: Option<&'a dyn Oracle>,
    /// whether bluffing is switched on for this match
    pub bluffing: bool,
    /// per-decision tie-break seed
    pub seed: u64,
}

/// A decided command. `substitute` asks the oracle to make a bluffed role true first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Choice {
    pub command: Command,
    pub substitute: Option<Role>,
}

impl Choice {
    fn plain(command: Command) -> Choice {
        Choice { command, substitute: None }
    }

    fn bluff(ctx: &Decision, command: Command, role: Role) -> Choice {
        Choice {
            command,
            substitute: ctx.oracle.map(|_| role),
        }
    }
}

/// A claim up for challenge.
#[derive(Copy, Clone, Debug)]
pub struct Contest {
    pub claimant: usize,
    pub role: Role,
    pub absence: bool,
    pub actor: usize,
    pub action: ActionKind,
    pub target: Option<usize>,
    pub block: bool,
}

impl<'a> Decision<'a> {
    pub fn me(&self) -> usize {
        self.state.own_index
    }

    pub fn own(&self) -> &Player {
        self.state.own()
    }

    pub fn holds(&self, role: Role) -> bool {
        self.own().holds(role)
    }

    fn own_count(&self, role: Role) -> usize {
        self.own().live_roles().filter(|&held| held == role).count()
    }

    pub fn is_teammate(&self, player: usize) -> bool {
        self.state.same_team(self.me(), player) && !self.state.teams_merged()
    }

    pub fn is_protected(&self, player: usize) -> bool {
        self.is_teammate(player) || self.alliance.is_friendly(player)
    }

    /// Living non-teammates, strongest first: most influence, then most cash, then a
    /// per-decision shuffle.
    pub fn ranked_opponents(&self) -> Vec<usize> {
        let mut ranked: Vec<usize> = self
            .state
            .other_player_indexes(self.me())
            .into_iter()
            .filter(|&idx| !self.is_teammate(idx))
            .collect();
        ranked.sort_by_key(|&idx| {
            let player = &self.state.players[idx];
            (Reverse(player.influence_count()), Reverse(player.cash), tiebreak(self.seed, &player.name))
        });
        ranked
    }

    /// Opponents we may act against, strongest first. The friend and its allies are only
    /// targeted once no genuine enemy is left alive.
    pub fn targets(&self) -> Vec<usize> {
        let ranked: Vec<usize> = self
            .ranked_opponents()
            .into_iter()
            .filter(|&idx| self.state.can_target(self.me(), idx))
            .collect();
        // teammates still count: only one player wins
        let enemies_left = self
            .state
            .other_player_indexes(self.me())
            .into_iter()
            .any(|idx| !self.alliance.is_friendly(idx));
        if enemies_left {
            ranked.into_iter().filter(|&idx| !self.alliance.is_friendly(idx)).collect()
        } else {
            ranked
        }
    }

    /// The single opponent left standing against us, if it has come to that.
    pub fn end_game_opponent(&self) -> Option<usize> {
        match self.ranked_opponents().as_slice() {
            [opponent] => Some(*opponent),
            _ => None,
        }
    }

    // every copy of the role is on the table or in our hand
    fn copies_accounted(&self, role: Role) -> bool {
        self.state.revealed_count(role) + self.own_count(role) >= self.state.settings.copies_per_role
    }

    fn fully_revealed(&self, role: Role) -> bool {
        self.state.revealed_count(role) >= self.state.settings.copies_per_role
    }

    // no contessa left for us to claim
    fn contessas_gone(&self) -> bool {
        let copies = self.state.settings.copies_per_role;
        let seen = self.state.revealed_count(Role::Contessa) + self.beliefs.claimants(Role::Contessa, self.me());
        seen >= copies || self.beliefs.caught_bluffing(self.me(), Role::Contessa)
    }

    pub fn duel(&self, opponent: usize, opponent_first: bool, my_role: Option<Role>, their_role: Option<Role>) -> Duel {
        let own = self.own();
        let them = &self.state.players[opponent];

        let mut my_roles: HashSet<Role> = own.live_roles().collect();
        my_roles.extend(my_role);
        let mut their_roles = self.beliefs.credible_claims(opponent);
        their_roles.extend(their_role);

        Duel {
            me: Side::new(own.cash, own.influence_count(), my_roles),
            opponent: Side::new(them.cash, them.influence_count(), their_roles),
            opponent_first,
            exchange_role: self.state.settings.exchange_role,
            horizon: self.config.search_horizon,
        }
    }
}

fn tiebreak(seed: u64, name: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    name.hash(&mut hasher);
    hasher.finish()
}

pub fn should_challenge<R: Rng>(ctx: &Decision, contest: &Contest, rng: &mut R) -> bool {
    let me = ctx.me();
    if contest.claimant == me || ctx.is_protected(contest.claimant) {
        return false;
    }

    if let Some(oracle) = ctx.oracle {
        // a claim of absence is false exactly when the role is held
        return oracle.holds(contest.claimant, contest.role) == contest.absence;
    }

    if contest.absence {
        // nobody can be holding a duke
        if ctx.copies_accounted(contest.role) {
            return false;
        }
    } else {
        if ctx.copies_accounted(contest.role) {
            return true;
        }
        if ctx.beliefs.caught_bluffing(contest.claimant, contest.role) {
            return true;
        }
    }

    let last_card_assassination = !contest.block
        && contest.action == ActionKind::Assassinate
        && contest.target == Some(me)
        && ctx.own().influence_count() == 1
        && !ctx.holds(Role::Contessa);
    if last_card_assassination && ctx.contessas_gone() {
        return true;
    }

    let worth_challenging = if contest.block {
        contest.actor == me
    } else {
        match contest.action {
            ActionKind::Tax | ActionKind::Embezzle => true,
            ActionKind::Steal | ActionKind::Assassinate => contest.target == Some(me),
            _ => false,
        }
    };
    if !worth_challenging {
        return false;
    }

    if ctx.end_game_opponent() == Some(contest.claimant) {
        let claimed = if contest.absence { None } else { Some(contest.role) };
        match ctx.duel(contest.claimant, true, None, claimed).simulate() {
            -1 => return true,
            1 => return false,
            _ => {}
        }
    }

    rng.gen_bool(ctx.config.chance_to_challenge)
}

/// Whether to claim `role` without holding it, for `action` or to block it.
pub fn should_bluff(ctx: &Decision, role: Role, action: ActionKind, blocking: bool) -> bool {
    let me = ctx.me();

    if action == ActionKind::Embezzle && !blocking {
        return ctx.state.treasury >= ctx.config.embezzle_reserve;
    }
    if ctx.beliefs.caught_bluffing(me, role) || ctx.fully_revealed(role) {
        return false;
    }
    // the only way to survive
    if blocking && role == Role::Contessa && action == ActionKind::Assassinate && ctx.own().influence_count() == 1 {
        return true;
    }
    if !ctx.bluffing {
        return false;
    }

    let bluffed: HashSet<Role> = ctx.beliefs.claims(me).filter(|&claimed| !ctx.holds(claimed)).collect();
    if !bluffed.contains(&role) && bluffed.len() >= ctx.config.max_bluffed_roles {
        return false;
    }

    // a bluff that would win outright is the one that gets challenged
    if let Some(opponent) = ctx.end_game_opponent() {
        if ctx.duel(opponent, false, Some(role), None).simulate() == 1 {
            return false;
        }
    }
    true
}

pub fn turn_start<R: Rng>(ctx: &Decision, rng: &mut R) -> Choice {
    let state = ctx.state;
    let me = ctx.me();
    let cash = ctx.own().cash;
    let targets = ctx.targets();
    let exchange_role = state.settings.exchange_role;

    let strongest = targets.first().copied();
    // forced coup at $10+
    if let Some(target) = strongest.filter(|_| cash >= 10) {
        return Choice::plain(Command::play_at(ActionKind::Coup, target));
    }

    if state.settings.is_reformation() && ctx.alliance.is_active() {
        if let Some(command) = threat::choose(state, me, ctx.alliance).command() {
            return Choice::plain(command);
        }
    }

    if let Some(target) = strongest.filter(|_| cash >= ActionKind::Coup.cost()) {
        return Choice::plain(Command::play_at(ActionKind::Coup, target));
    }

    let assassinate_target = targets.iter().copied().find(|&idx| !ctx.beliefs.has_claimed(idx, Role::Contessa));
    let steal_target = targets.iter().copied().find(|&idx| {
        state.players[idx].cash > 0
            && !ctx.beliefs.has_claimed(idx, Role::Captain)
            && !ctx.beliefs.has_claimed(idx, exchange_role)
    });
    let can_assassinate = cash >= ActionKind::Assassinate.cost();

    if ctx.holds(Role::Assassin) && can_assassinate {
        if let Some(target) = assassinate_target {
            return Choice::plain(Command::play_at(ActionKind::Assassinate, target));
        }
    }
    if ctx.holds(Role::Captain) {
        if let Some(target) = steal_target {
            return Choice::plain(Command::play_at(ActionKind::Steal, target));
        }
    }
    if ctx.holds(Role::Duke) {
        let tax = Choice::plain(Command::play(ActionKind::Tax));
        // claiming no duke while holding one
        if state.settings.is_reformation() && ctx.bluffing && should_bluff(ctx, Role::Duke, ActionKind::Embezzle, false) {
            let embezzle = Choice::plain(Command::play(ActionKind::Embezzle));
            return if rng.gen_bool(0.5) { embezzle } else { tax };
        }
        return tax;
    }
    if state.settings.is_reformation() && state.treasury >= ctx.config.embezzle_reserve {
        return Choice::plain(Command::play(ActionKind::Embezzle));
    }

    let mut bluffs: Vec<Choice> = Vec::with_capacity(4);
    if let Some(target) = assassinate_target.filter(|_| can_assassinate) {
        if should_bluff(ctx, Role::Assassin, ActionKind::Assassinate, false) {
            bluffs.push(Choice::bluff(ctx, Command::play_at(ActionKind::Assassinate, target), Role::Assassin));
        }
    }
    if let Some(target) = steal_target {
        if should_bluff(ctx, Role::Captain, ActionKind::Steal, false) {
            bluffs.push(Choice::bluff(ctx, Command::play_at(ActionKind::Steal, target), Role::Captain));
        }
    }
    if should_bluff(ctx, Role::Duke, ActionKind::Tax, false) {
        bluffs.push(Choice::bluff(ctx, Command::play(ActionKind::Tax), Role::Duke));
    }
    if let Some(choice) = bluffs.choose(rng) {
        return choice.clone();
    }

    let useful = [Role::Duke, Role::Captain, Role::Assassin].iter().any(|&role| ctx.holds(role));
    if !useful {
        if ctx.holds(exchange_role) {
            return Choice::plain(Command::play(ActionKind::Exchange));
        }
        if should_bluff(ctx, exchange_role, ActionKind::Exchange, false) {
            return Choice::bluff(ctx, Command::play(ActionKind::Exchange), exchange_role);
        }
    }

    let duke_claimed = ctx
        .ranked_opponents()
        .into_iter()
        .any(|idx| ctx.beliefs.credible_claims(idx).contains(&Role::Duke));
    if duke_claimed {
        Choice::plain(Command::play(ActionKind::Income))
    } else {
        Choice::plain(Command::play(ActionKind::ForeignAid))
    }
}

/// Response to an action, or to the target's last chance to block it.
pub fn action_response<R: Rng>(
    ctx: &Decision,
    actor: usize,
    action: ActionKind,
    target: Option<usize>,
    last_chance: bool,
    rng: &mut R,
) -> Choice {
    let state = ctx.state;
    let me = ctx.me();

    // nothing to lose
    if action == ActionKind::Steal && target == Some(me) && ctx.own().cash == 0 {
        return Choice::plain(Command::Allow);
    }
    if ctx.is_protected(actor) && target != Some(me) {
        return Choice::plain(Command::Allow);
    }

    let mut blockers: Vec<Role> = action
        .blocked_by(state.settings.exchange_role)
        .into_iter()
        .filter(|&role| can_block(state, me, action, actor, target, role))
        .collect();
    if let Some(&role) = blockers.iter().find(|&&role| ctx.holds(role)) {
        return Choice::plain(Command::Block { role });
    }

    if !last_chance {
        if let Some(role) = action.claimed_role(state.settings.exchange_role) {
            let contest = Contest {
                claimant: actor,
                role,
                absence: action.claims_absence(),
                actor,
                action,
                target,
                block: false,
            };
            if should_challenge(ctx, &contest, rng) {
                return Choice::plain(Command::Challenge);
            }
        }
    }

    blockers.shuffle(rng);
    for role in blockers {
        if should_bluff(ctx, role, action, true) {
            return Choice::bluff(ctx, Command::Block { role }, role);
        }
    }
    Choice::plain(Command::Allow)
}

pub fn block_response<R: Rng>(ctx: &Decision, phase: &Phase, rng: &mut R) -> Choice {
    if let Phase::BlockResponse { player, action, target, blocker, role, .. } = phase {
        let contest = Contest {
            claimant: *blocker,
            role: *role,
            absence: false,
            actor: *player,
            action: *action,
            target: *target,
            block: true,
        };
        if should_challenge(ctx, &contest, rng) {
            return Choice::plain(Command::Challenge);
        }
    }
    Choice::plain(Command::Allow)
}

/// Picks a live card to give up, cards with a high reveal weight more often.
pub fn choose_reveal<R: Rng>(player: &Player, rng: &mut R) -> Option<Role> {
    let roles: Vec<Role> = player.live_roles().collect();
    match roles.as_slice() {
        [] => None,
        [only] => Some(*only),
        _ => {
            let weights = WeightedIndex::new(roles.iter().map(|role| role.reveal_weight())).ok()?;
            Some(roles[weights.sample(rng)])
        }
    }
}

/// Keeps `needed` cards out of `options`, walking the exchange priority once and padding
/// with whatever is left.
pub fn choose_exchange(options: &[Role], needed: usize) -> Vec<Role> {
    let mut taken = vec![false; options.len()];
    let mut chosen = Vec::with_capacity(needed);

    for role in EXCHANGE_PRIORITY {
        if chosen.len() == needed {
            break;
        }
        if let Some(idx) = (0..options.len()).find(|&idx| !taken[idx] && options[idx] == role) {
            taken[idx] = true;
            chosen.push(role);
        }
    }
    for idx in 0..options.len() {
        if chosen.len() == needed {
            break;
        }
        if !taken[idx] {
            taken[idx] = true;
            chosen.push(options[idx]);
        }
    }
    chosen
}

/// One decision for whoever owns `ctx.state`, or `None` if nothing is asked of it.
pub fn decide_phase<R: Rng>(ctx: &Decision, rng: &mut R) -> Option<Choice> {
    let state = ctx.state;
    let me = ctx.me();

    match &state.phase {
        Phase::TurnStart { player } if *player == me => Some(turn_start(ctx, rng)),
        Phase::ActionResponse { player, action, target, .. } if is_responder(state, me) => {
            Some(action_response(ctx, *player, *action, *target, false, rng))
        }
        Phase::FinalActionResponse { player, action, target } if is_responder(state, me) => {
            Some(action_response(ctx, *player, *action, *target, true, rng))
        }
        Phase::BlockResponse { .. } if is_responder(state, me) => Some(block_response(ctx, &state.phase, rng)),
        Phase::RevealInfluence { reveal, .. } if *reveal == me => {
            choose_reveal(ctx.own(), rng).map(|role| Choice::plain(Command::Reveal { role }))
        }
        Phase::Exchange { player, options } if *player == me => Some(Choice::plain(Command::Exchange {
            roles: choose_exchange(options, ctx.own().influence_count()),
        })),
        _ => None,
    }
}

/// The heuristic player's brain: configuration, claim memory and its own randomness.
pub struct HeuristicPolicy<R: Rng> {
    config: PolicyConfig,
    beliefs: BeliefTracker,
    bluffing: bool,
    rng: R,
}

impl HeuristicPolicy<Pcg64> {
    pub fn from_config(config: PolicyConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => Pcg64::seed_from_u64(seed),
            None => Pcg64::from_entropy(),
        };
        HeuristicPolicy::new(config, rng)
    }
}

impl<R: Rng> HeuristicPolicy<R> {
    pub fn new(config: PolicyConfig, mut rng: R) -> Self {
        let bluffing = rng.gen_bool(config.chance_to_bluff.clamp(0.0, 1.0));
        HeuristicPolicy {
            config,
            beliefs: BeliefTracker::new(),
            bluffing,
            rng,
        }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn beliefs(&self) -> &BeliefTracker {
        &self.beliefs
    }

    pub fn is_bluffing(&self) -> bool {
        self.bluffing
    }

    /// Forgets the last match and flips the bluffing coin again.
    pub fn new_match(&mut self) {
        self.beliefs.clear();
        self.bluffing = self.rng.gen_bool(self.config.chance_to_bluff.clamp(0.0, 1.0));
    }

    pub fn observe_phase(&mut self, state: &GameState) {
        self.beliefs.observe_phase(state);
    }

    pub fn observe_event(&mut self, event: &HistoryEvent) {
        self.beliefs.observe_event(event);
    }

    /// `base_ms` shifted by a uniform offset within `spread_ms` either way.
    pub fn thinking_delay(&mut self) -> Duration {
        let delay = self.config.delay;
        let offset = if delay.spread_ms == 0 { 0 } else { self.rng.gen_range(0..=2 * delay.spread_ms) };
        Duration::from_millis((delay.base_ms + offset).saturating_sub(delay.spread_ms))
    }

    pub fn decide(&mut self, state: &GameState, mut oracle: Option<&mut dyn Oracle>) -> Result<Option<Command>, DecisionError> {
        state.validate()?;
        let me = state.own_index;
        if !state.is_alive(me) {
            return Ok(None);
        }

        let alliance = Alliance::resolve(state, self.config.friend.as_deref(), &self.config.allies);
        let privileged = alliance.is_active() && state.settings.is_reformation();
        if !privileged {
            oracle = None;
        }

        // only the two of us left: concede to the friend
        if let (Phase::TurnStart { player }, Some(friend)) = (&state.phase, alliance.friend) {
            if *player == me && state.living() == sorted_pair(me, friend) {
                if let Some(oracle) = oracle.as_deref_mut() {
                    debug!(player = me, friend, "conceding to friend");
                    oracle.discard(me);
                    return Ok(None);
                }
            }
        }

        let seed = self.rng.gen();
        let choice = {
            let ctx = Decision {
                state,
                beliefs: &self.beliefs,
                config: &self.config,
                alliance: &alliance,
                oracle: oracle.as_deref(),
                bluffing: self.bluffing,
                seed,
            };
            decide_phase(&ctx, &mut self.rng)
        };
        let choice = match choice {
            Some(choice) => choice,
            None => return Ok(None),
        };

        if let (Some(role), Some(oracle)) = (choice.substitute, oracle.as_deref_mut()) {
            oracle.substitute(me, role);
        }
        self.remember(state, &choice.command);

        debug!(
            player = me,
            phase = state.phase_name(),
            command = %choice.command,
            bluffing = self.bluffing,
            "heuristic decided"
        );
        Ok(Some(choice.command))
    }

    // keep our own claims in step with what we just said
    fn remember(&mut self, state: &GameState, command: &Command) {
        let me = state.own_index;
        match command {
            Command::PlayAction { action, .. } if !action.claims_absence() => {
                if let Some(role) = action.claimed_role(state.settings.exchange_role) {
                    self.beliefs.record_claim(me, role);
                }
            }
            Command::Block { role } => self.beliefs.record_claim(me, *role),
            Command::Reveal { role } => self.beliefs.remove_claim(me, *role),
            Command::Exchange { .. } => self.beliefs.reset_hand(me),
            _ => {}
        }
    }
}

fn sorted_pair(a: usize, b: usize) -> Vec<usize> {
    if a < b {
        vec![a, b]
    } else {
        vec![b, a]
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::time::Duration;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;
    use crate::action::{ActionKind, Command};
    use crate::belief::BeliefTracker;
    use crate::config::{DelayConfig, PolicyConfig};
    use crate::history::HistoryEvent;
    use crate::policy::{choose_exchange, choose_reveal, should_bluff, should_challenge, Contest, Decision, HeuristicPolicy};
    use crate::rules::{apply, Unseen};
    use crate::state::tests::table;
    use crate::state::{GameState, Influence, Phase, Player, Team, Variant};
    use crate::threat::Alliance;
    use crate::transport::Oracle;
    use crate::Role;
    use crate::Role::{Ambassador, Assassin, Captain, Contessa, Duke};

    fn config() -> PolicyConfig {
        PolicyConfig {
            chance_to_bluff: 0.0,
            chance_to_challenge: 0.0,
            delay: DelayConfig::none(),
            ..PolicyConfig::default()
        }
    }

    fn policy(config: PolicyConfig) -> HeuristicPolicy<Pcg64> {
        HeuristicPolicy::new(config, Pcg64::seed_from_u64(11))
    }

    fn ctx<'a>(state: &'a GameState, beliefs: &'a BeliefTracker, config: &'a PolicyConfig, alliance: &'a Alliance, bluffing: bool) -> Decision<'a> {
        Decision { state, beliefs, config, alliance, oracle: None, bluffing, seed: 5 }
    }

    #[derive(Default)]
    struct RecordingOracle {
        held: Vec<(usize, Role)>,
        calls: RefCell<Vec<String>>,
    }

    impl Oracle for RecordingOracle {
        fn holds(&self, player: usize, role: Role) -> bool {
            self.calls.borrow_mut().push(format!("holds {player} {}", role.name()));
            self.held.contains(&(player, role))
        }

        fn substitute(&mut self, player: usize, role: Role) {
            self.calls.borrow_mut().push(format!("substitute {player} {}", role.name()));
        }

        fn discard(&mut self, player: usize) {
            self.calls.borrow_mut().push(format!("discard {player}"));
        }
    }

    #[test]
    fn exchange_follows_priority() {
        assert_eq!(choose_exchange(&[Duke, Duke, Captain], 2), vec![Duke, Captain]);
        assert_eq!(choose_exchange(&[Ambassador, Contessa, Assassin], 1), vec![Assassin]);
        assert_eq!(choose_exchange(&[Ambassador, Ambassador, Ambassador], 2), vec![Ambassador, Ambassador]);
    }

    #[test]
    fn reveal_prefers_heavy_cards() {
        let player = Player::new("p0", 2, vec![Influence::hidden(Duke), Influence::hidden(Ambassador)]);
        let mut rng = Pcg64::seed_from_u64(99);
        let trials = 12_000;
        let ambassadors = (0..trials)
            .filter(|_| choose_reveal(&player, &mut rng) == Some(Ambassador))
            .count();
        let share = ambassadors as f64 / trials as f64;
        assert!((0.72..0.78).contains(&share), "ambassador share {share}");
    }

    #[test]
    fn last_card_reveal_is_forced() {
        let mut player = Player::new("p0", 2, vec![Influence::hidden(Duke), Influence::hidden(Ambassador)]);
        player.influence[1].revealed = true;
        assert_eq!(choose_reveal(&player, &mut Pcg64::seed_from_u64(1)), Some(Duke));
    }

    #[test]
    fn caught_bluffer_is_always_challenged() {
        let mut policy = policy(config());
        let state = table(vec![vec![Captain, Contessa], vec![Contessa, Ambassador], vec![Duke, Duke]]);
        let mut state = state.perspective(0);
        state.phase = Phase::TurnStart { player: 1 };

        // p1's tax gets caught once
        let taxed = apply(&state, 1, &Command::play(ActionKind::Tax), &mut Unseen).unwrap();
        policy.observe_phase(&taxed);
        let caught = apply(&taxed, 2, &Command::Challenge, &mut Unseen).unwrap();
        policy.observe_phase(&caught);
        policy.observe_event(&HistoryEvent::Challenged { challenger: 2, challenged: 1, succeeded: true });

        // later p1 claims duke again
        assert_eq!(policy.decide(&taxed, None).unwrap(), Some(Command::Challenge));

        // until a fresh hand
        policy.observe_event(&HistoryEvent::Exchanged { player: 1 });
        assert_eq!(policy.decide(&taxed, None).unwrap(), Some(Command::Allow));
    }

    #[test]
    fn caught_bluff_is_never_repeated() {
        let state = table(vec![vec![Contessa, Ambassador], vec![Duke, Duke]]).perspective(0);
        let config = config();
        let alliance = Alliance::default();
        let mut beliefs = BeliefTracker::new();
        assert!(should_bluff(&ctx(&state, &beliefs, &config, &alliance, true), Duke, ActionKind::Tax, false));

        let taxed = apply(&state, 0, &Command::play(ActionKind::Tax), &mut Unseen).unwrap();
        beliefs.observe_phase(&taxed);
        beliefs.observe_event(&HistoryEvent::Challenged { challenger: 1, challenged: 0, succeeded: true });
        assert!(!should_bluff(&ctx(&state, &beliefs, &config, &alliance, true), Duke, ActionKind::Tax, false));
        assert!(should_bluff(&ctx(&state, &beliefs, &config, &alliance, true), Captain, ActionKind::Steal, false));
    }

    #[test]
    fn bluffs_are_capped() {
        let state = table(vec![vec![Contessa, Ambassador], vec![Duke, Duke], vec![Duke, Duke]]).perspective(0);
        let config = config();
        let alliance = Alliance::default();
        let mut beliefs = BeliefTracker::new();
        beliefs.record_claim(0, Duke);
        beliefs.record_claim(0, Captain);
        // an honest claim does not count
        beliefs.record_claim(0, Contessa);

        let ctx = ctx(&state, &beliefs, &config, &alliance, true);
        assert!(should_bluff(&ctx, Duke, ActionKind::Tax, false));
        assert!(!should_bluff(&ctx, Assassin, ActionKind::Assassinate, false));
    }

    #[test]
    fn no_bluffing_when_switched_off() {
        let state = table(vec![vec![Contessa, Ambassador], vec![Duke, Duke]]).perspective(0);
        let config = config();
        let alliance = Alliance::default();
        let beliefs = BeliefTracker::new();
        assert!(!should_bluff(&ctx(&state, &beliefs, &config, &alliance, false), Duke, ActionKind::Tax, false));
    }

    #[test]
    fn rich_players_coup_the_strongest() {
        let mut state = table(vec![vec![Contessa, Ambassador], vec![Duke, Duke], vec![Captain, Duke]]);
        state.players[0].cash = 7;
        state.players[1].influence[0].revealed = true;
        let state = state.perspective(0);
        assert_eq!(
            policy(config()).decide(&state, None).unwrap(),
            Some(Command::play_at(ActionKind::Coup, 2))
        );
    }

    #[test]
    fn honest_roles_come_first() {
        let state = table(vec![vec![Duke, Contessa], vec![Duke, Duke]]).perspective(0);
        assert_eq!(policy(config()).decide(&state, None).unwrap(), Some(Command::play(ActionKind::Tax)));

        let mut state = table(vec![vec![Assassin, Contessa], vec![Duke, Duke]]);
        state.players[0].cash = 3;
        let state = state.perspective(0);
        assert_eq!(
            policy(config()).decide(&state, None).unwrap(),
            Some(Command::play_at(ActionKind::Assassinate, 1))
        );
    }

    #[test]
    fn nothing_useful_means_exchange() {
        let state = table(vec![vec![Ambassador, Contessa], vec![Duke, Duke]]).perspective(0);
        assert_eq!(policy(config()).decide(&state, None).unwrap(), Some(Command::play(ActionKind::Exchange)));
    }

    #[test]
    fn foreign_aid_unless_a_duke_is_claimed() {
        let state = table(vec![vec![Contessa, Contessa], vec![Duke, Duke]]).perspective(0);
        let mut policy = policy(config());
        assert_eq!(policy.decide(&state, None).unwrap(), Some(Command::play(ActionKind::ForeignAid)));

        let mut taxed = state.clone();
        taxed.phase = Phase::ActionResponse { player: 1, action: ActionKind::Tax, target: None, allowed: vec![false, true] };
        policy.observe_phase(&taxed);
        assert_eq!(policy.decide(&state, None).unwrap(), Some(Command::play(ActionKind::Income)));
    }

    #[test]
    fn blocks_honestly_and_bluffs_contessa_on_the_last_card() {
        let mut state = table(vec![vec![Duke, Duke], vec![Contessa, Ambassador], vec![Captain, Captain]]);
        state.players[0].cash = 3;
        let assassinated = apply(&state, 0, &Command::play_at(ActionKind::Assassinate, 1), &mut Unseen).unwrap();
        assert_eq!(
            policy(config()).decide(&assassinated.perspective(1), None).unwrap(),
            Some(Command::Block { role: Contessa })
        );

        // p2 has one card and no contessa
        let mut state = table(vec![vec![Duke, Duke], vec![Contessa, Ambassador], vec![Captain, Captain]]);
        state.players[0].cash = 3;
        state.players[2].influence[0].revealed = true;
        let assassinated = apply(&state, 0, &Command::play_at(ActionKind::Assassinate, 2), &mut Unseen).unwrap();
        assert_eq!(
            policy(config()).decide(&assassinated.perspective(2), None).unwrap(),
            Some(Command::Block { role: Contessa })
        );
    }

    #[test]
    fn challenges_when_every_copy_is_accounted_for() {
        let mut state = table(vec![vec![Duke, Duke], vec![Captain, Contessa], vec![Duke, Captain]]);
        state.players[2].influence[0].revealed = true;
        state.phase = Phase::TurnStart { player: 1 };
        let taxed = apply(&state, 1, &Command::play(ActionKind::Tax), &mut Unseen).unwrap();
        assert_eq!(policy(config()).decide(&taxed.perspective(0), None).unwrap(), Some(Command::Challenge));
    }

    #[test]
    fn allows_a_steal_with_empty_pockets() {
        let mut state = table(vec![vec![Captain, Duke], vec![Captain, Contessa]]);
        state.players[1].cash = 0;
        let stolen = apply(&state, 0, &Command::play_at(ActionKind::Steal, 1), &mut Unseen).unwrap();
        assert_eq!(policy(config()).decide(&stolen.perspective(1), None).unwrap(), Some(Command::Allow));
    }

    #[test]
    fn exchange_clears_own_memory() {
        let mut policy = policy(config());
        let mut state = table(vec![vec![Ambassador, Contessa], vec![Duke, Duke]]).perspective(0);
        state.phase = Phase::Exchange { player: 0, options: vec![Contessa, Ambassador, Duke, Captain] };
        let mut before = state.clone();
        before.phase = Phase::ActionResponse { player: 0, action: ActionKind::Exchange, target: None, allowed: vec![true, false] };
        policy.observe_phase(&before);
        assert!(policy.beliefs().has_claimed(0, Ambassador));

        assert_eq!(policy.decide(&state, None).unwrap(), Some(Command::Exchange { roles: vec![Duke, Captain] }));
        assert_eq!(policy.beliefs().claims(0).count(), 0);
    }

    #[test]
    fn no_decision_outside_our_phases() {
        let state = table(vec![vec![Duke, Duke], vec![Duke, Duke]]).perspective(1);
        assert_eq!(policy(config()).decide(&state, None).unwrap(), None);
    }

    #[test]
    fn malformed_snapshot_is_refused() {
        let mut state = table(vec![vec![Duke, Duke], vec![Duke, Duke]]);
        state.phase = Phase::RevealInfluence {
            player: 0,
            action: ActionKind::Coup,
            target: Some(1),
            reveal: 9,
            reason: crate::state::RevealReason::Coup,
        };
        assert!(policy(config()).decide(&state, None).is_err());
    }

    #[test]
    fn ranking_and_friend_skipping() {
        let mut state = table(vec![vec![Duke, Duke], vec![Duke, Duke], vec![Duke, Duke], vec![Duke, Duke]]);
        state.players[1].influence[0].revealed = true;
        state.players[3].cash = 5;
        let config = PolicyConfig { friend: Some("p3".to_string()), ..config() };
        let beliefs = BeliefTracker::new();
        let alliance = Alliance::resolve(&state, config.friend.as_deref(), &config.allies);
        let ctx = ctx(&state, &beliefs, &config, &alliance, false);

        assert_eq!(ctx.ranked_opponents(), vec![3, 2, 1]);
        assert_eq!(ctx.targets(), vec![2, 1]);
    }

    #[test]
    fn teammates_are_not_challenged() {
        let mut state = table(vec![vec![Contessa, Contessa], vec![Captain, Captain], vec![Duke, Duke]]);
        state.settings.variant = Variant::Reformation;
        state.players[0].team = Some(Team::Loyalist);
        state.players[1].team = Some(Team::Loyalist);
        state.players[2].team = Some(Team::Reformist);
        state.players[1].cash = 3;
        state.phase = Phase::TurnStart { player: 1 };
        let assassinate = apply(&state, 1, &Command::play_at(ActionKind::Assassinate, 2), &mut Unseen).unwrap();

        let config = PolicyConfig { chance_to_challenge: 1.0, ..config() };
        assert_eq!(policy(config).decide(&assassinate.perspective(0), None).unwrap(), Some(Command::Allow));
    }

    fn alliance_table() -> GameState {
        let mut state = table(vec![vec![Contessa, Ambassador], vec![Captain, Captain], vec![Duke, Captain]]);
        state.settings.variant = Variant::Reformation;
        state.players[0].team = Some(Team::Loyalist);
        state.players[1].team = Some(Team::Reformist);
        state.players[2].team = Some(Team::Reformist);
        state
    }

    #[test]
    fn oracle_settles_challenges_in_alliance_mode() {
        let mut state = alliance_table();
        state.phase = Phase::TurnStart { player: 2 };
        let taxed = apply(&state, 2, &Command::play(ActionKind::Tax), &mut Unseen).unwrap().perspective(0);
        let config = PolicyConfig { friend: Some("p1".to_string()), ..config() };

        let mut oracle = RecordingOracle::default();
        assert_eq!(policy(config.clone()).decide(&taxed, Some(&mut oracle)).unwrap(), Some(Command::Challenge));
        assert_eq!(oracle.calls.borrow().as_slice(), ["holds 2 duke"]);

        let mut oracle = RecordingOracle { held: vec![(2, Duke)], ..RecordingOracle::default() };
        assert_eq!(policy(config).decide(&taxed, Some(&mut oracle)).unwrap(), Some(Command::Allow));
    }

    #[test]
    fn oracle_is_unused_without_an_alliance() {
        let mut state = alliance_table();
        state.phase = Phase::TurnStart { player: 2 };
        let taxed = apply(&state, 2, &Command::play(ActionKind::Tax), &mut Unseen).unwrap().perspective(0);

        let mut oracle = RecordingOracle::default();
        policy(config()).decide(&taxed, Some(&mut oracle)).unwrap();
        assert!(oracle.calls.borrow().is_empty());
    }

    #[test]
    fn concedes_when_only_the_friend_is_left() {
        let mut state = alliance_table();
        state.players[2].influence.iter_mut().for_each(|card| card.revealed = true);
        let config = PolicyConfig { friend: Some("p1".to_string()), ..config() };

        let mut oracle = RecordingOracle::default();
        assert_eq!(policy(config).decide(&state.perspective(0), Some(&mut oracle)).unwrap(), None);
        assert_eq!(oracle.calls.borrow().as_slice(), ["discard 0"]);
    }

    fn claim(claimant: usize, role: Role, action: ActionKind, target: Option<usize>) -> Contest {
        Contest {
            claimant,
            role,
            absence: action.claims_absence(),
            actor: claimant,
            action,
            target,
            block: false,
        }
    }

    #[test]
    fn losing_duel_means_challenge() {
        // p1 taxes its way to a coup before we can do anything
        let mut state = table(vec![vec![Contessa, Ambassador], vec![Duke, Captain]]);
        state.players[0].cash = 1;
        state.players[0].influence[1].revealed = true;
        let state = state.perspective(0);
        let config = config();
        let alliance = Alliance::default();
        let beliefs = BeliefTracker::new();
        let ctx = ctx(&state, &beliefs, &config, &alliance, false);

        let tax = claim(1, Duke, ActionKind::Tax, None);
        assert!(should_challenge(&ctx, &tax, &mut Pcg64::seed_from_u64(1)));
    }

    #[test]
    fn winning_duel_means_no_challenge() {
        // our assassin finishes p1 even if its duke is real
        let mut state = table(vec![vec![Assassin, Duke], vec![Captain, Contessa]]);
        state.players[0].cash = 3;
        state.players[1].influence[0].revealed = true;
        let config = PolicyConfig { chance_to_challenge: 1.0, ..config() };
        let alliance = Alliance::default();
        let beliefs = BeliefTracker::new();
        let tax = claim(1, Duke, ActionKind::Tax, None);

        let view = state.perspective(0);
        assert!(!should_challenge(&ctx(&view, &beliefs, &config, &alliance, false), &tax, &mut Pcg64::seed_from_u64(1)));

        // with a third player around it is a coin flip again
        state.players.push(Player::new("p2", 2, vec![Influence::hidden(Duke), Influence::hidden(Duke)]));
        let view = state.perspective(0);
        assert!(should_challenge(&ctx(&view, &beliefs, &config, &alliance, false), &tax, &mut Pcg64::seed_from_u64(1)));
    }

    #[test]
    fn no_bluff_when_the_duel_is_already_won() {
        let mut state = table(vec![vec![Contessa, Ambassador], vec![Duke, Captain]]);
        state.players[0].cash = 3;
        state.players[1].cash = 0;
        state.players[1].influence[1].revealed = true;
        let config = config();
        let alliance = Alliance::default();
        let beliefs = BeliefTracker::new();

        let view = state.perspective(0);
        assert!(!should_bluff(&ctx(&view, &beliefs, &config, &alliance, true), Assassin, ActionKind::Assassinate, false));

        state.players.push(Player::new("p2", 2, vec![Influence::hidden(Duke), Influence::hidden(Duke)]));
        let view = state.perspective(0);
        assert!(should_bluff(&ctx(&view, &beliefs, &config, &alliance, true), Assassin, ActionKind::Assassinate, false));
    }

    #[test]
    fn last_card_assassination_is_challenged_once_contessas_are_gone() {
        let mut state = table(vec![vec![Duke, Captain], vec![Assassin, Duke], vec![Contessa, Contessa]]);
        state.players[0].influence[1].revealed = true;
        state.players[2].influence[0].revealed = true;
        let state = state.perspective(0);
        let config = config();
        let alliance = Alliance::default();
        let assassinate = claim(1, Assassin, ActionKind::Assassinate, Some(0));

        let beliefs = BeliefTracker::new();
        assert!(!should_challenge(&ctx(&state, &beliefs, &config, &alliance, false), &assassinate, &mut Pcg64::seed_from_u64(1)));

        // one contessa on the table, two more claimed
        let mut beliefs = BeliefTracker::new();
        beliefs.record_claim(1, Contessa);
        beliefs.record_claim(2, Contessa);
        assert!(should_challenge(&ctx(&state, &beliefs, &config, &alliance, false), &assassinate, &mut Pcg64::seed_from_u64(1)));
    }

    fn reformation(hands: Vec<Vec<Role>>) -> GameState {
        let mut state = table(hands);
        state.settings.variant = Variant::Reformation;
        for (idx, player) in state.players.iter_mut().enumerate() {
            player.team = Some(if idx == 0 { Team::Loyalist } else { Team::Reformist });
        }
        state
    }

    #[test]
    fn embezzle_is_not_challenged_when_every_duke_is_accounted_for() {
        let config = PolicyConfig { chance_to_challenge: 1.0, ..config() };
        let alliance = Alliance::default();
        let beliefs = BeliefTracker::new();
        let embezzle = claim(1, Duke, ActionKind::Embezzle, None);

        let mut state = reformation(vec![vec![Duke, Duke], vec![Captain, Contessa], vec![Duke, Captain]]);
        state.players[2].influence[0].revealed = true;
        let view = state.perspective(0);
        assert!(!should_challenge(&ctx(&view, &beliefs, &config, &alliance, false), &embezzle, &mut Pcg64::seed_from_u64(1)));

        let state = reformation(vec![vec![Captain, Contessa], vec![Captain, Contessa], vec![Duke, Captain]]);
        let view = state.perspective(0);
        assert!(should_challenge(&ctx(&view, &beliefs, &config, &alliance, false), &embezzle, &mut Pcg64::seed_from_u64(1)));
    }

    #[test]
    fn duke_holder_sometimes_embezzles() {
        let mut state = reformation(vec![vec![Duke, Contessa], vec![Captain, Captain]]);
        state.treasury = 5;
        let state = state.perspective(0);
        let config = PolicyConfig { chance_to_bluff: 1.0, ..config() };

        let decided: Vec<Option<Command>> = (0..20)
            .map(|seed| HeuristicPolicy::new(config.clone(), Pcg64::seed_from_u64(seed)).decide(&state, None).unwrap())
            .collect();
        assert!(decided.contains(&Some(Command::play(ActionKind::Embezzle))));
        assert!(decided.contains(&Some(Command::play(ActionKind::Tax))));

        // an empty treasury is not worth the lie
        let mut poor = state.clone();
        poor.treasury = 0;
        for seed in 0..5 {
            let mut policy = HeuristicPolicy::new(config.clone(), Pcg64::seed_from_u64(seed));
            assert_eq!(policy.decide(&poor, None).unwrap(), Some(Command::play(ActionKind::Tax)));
        }
    }

    #[test]
    fn friend_is_spared_while_enemies_live() {
        // p1 is the friend, the rich p2 and p3 are our untargetable teammates
        let mut state = table(vec![vec![Duke, Captain], vec![Contessa, Duke], vec![Duke, Duke], vec![Captain, Captain]]);
        state.settings.variant = Variant::Reformation;
        state.players[0].team = Some(Team::Loyalist);
        state.players[1].team = Some(Team::Reformist);
        state.players[2].team = Some(Team::Loyalist);
        state.players[3].team = Some(Team::Loyalist);
        state.players[0].cash = 7;
        state.players[1].cash = 0;
        state.players[1].influence[0].revealed = true;
        state.players[2].cash = 7;
        state.players[3].cash = 7;
        let state = state.perspective(0);

        let config = PolicyConfig { friend: Some("p1".to_string()), ..config() };
        let beliefs = BeliefTracker::new();
        let alliance = Alliance::resolve(&state, config.friend.as_deref(), &config.allies);
        assert!(ctx(&state, &beliefs, &config, &alliance, false).targets().is_empty());

        let decided = policy(config).decide(&state, None).unwrap();
        assert_ne!(decided, Some(Command::play_at(ActionKind::Coup, 1)));
    }

    #[test]
    fn thinking_delay_stays_in_range() {
        let mut policy = policy(PolicyConfig {
            delay: DelayConfig { base_ms: 1000, spread_ms: 500 },
            ..config()
        });
        for _ in 0..100 {
            let delay = policy.thinking_delay();
            assert!(delay >= Duration::from_millis(500) && delay <= Duration::from_millis(1500));
        }
    }
}
