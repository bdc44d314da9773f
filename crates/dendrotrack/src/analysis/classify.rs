//! Per-stack filopodial state classification.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::{MotilityOptions, TipFilopodium, Tree};

/// Filopodial / branching state of one branch in one stack.
///
/// The declaration order is meaningful: range checks such as
/// `Absent < s < BranchOnly` define the predicates below.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FiloState {
    #[default]
    Absent,
    Interstitial,
    Terminal,
    BranchWithInterstitial,
    BranchWithTerminal,
    BranchOnly,
}

impl FiloState {
    pub const ALL: [FiloState; 6] = [
        Self::Absent,
        Self::Interstitial,
        Self::Terminal,
        Self::BranchWithInterstitial,
        Self::BranchWithTerminal,
        Self::BranchOnly,
    ];

    pub fn exists(self) -> bool {
        self > Self::Absent
    }

    /// Any state carrying a filopodium, including branches that end in one.
    pub fn is_filo(self) -> bool {
        self > Self::Absent && self < Self::BranchOnly
    }

    pub fn is_branch(self) -> bool {
        self > Self::Terminal
    }

    /// Numeric code used in exported tables (0..=5).
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Interstitial => "interstitial",
            Self::Terminal => "terminal",
            Self::BranchWithInterstitial => "branch_with_interstitial",
            Self::BranchWithTerminal => "branch_with_terminal",
            Self::BranchOnly => "branch_only",
        }
    }
}

impl std::fmt::Display for FiloState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Classifier output for one tree, indexed by tree branch index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeClassification {
    pub states: Vec<FiloState>,
    /// Branch indices (of the same tree) anchoring each branch's identity.
    pub masters: Vec<BTreeSet<usize>>,
}

impl TreeClassification {
    fn new(n_branches: usize) -> Self {
        Self {
            states: vec![FiloState::Absent; n_branches],
            masters: vec![BTreeSet::new(); n_branches],
        }
    }

    fn set(&mut self, bi: usize, state: FiloState, master: BTreeSet<usize>) {
        self.states[bi] = state;
        self.masters[bi] = master;
    }
}

struct Classifier<'a> {
    tree: &'a Tree,
    opts: &'a MotilityOptions,
    pixel_sizes: [f64; 3],
    visited: Vec<bool>,
    out: TreeClassification,
}

/// Classify every branch of `tree`.
///
/// Classification starts from each branch attached to the root point and
/// descends depth-first. Branches not reachable from the root stay `Absent`.
pub fn classify_tree(tree: &Tree, opts: &MotilityOptions, pixel_sizes: [f64; 3]) -> TreeClassification {
    let n = tree.branches().len();
    let mut c = Classifier {
        tree,
        opts,
        pixel_sizes,
        visited: vec![false; n],
        out: TreeClassification::new(n),
    };
    if let Some(root) = tree.root_point() {
        for bi in tree.child_branch_indices(&root.id) {
            c.visit(bi);
        }
    }
    tracing::trace!(
        n_branches = n,
        n_filo = c.out.states.iter().filter(|s| s.is_filo()).count(),
        "classify_tree"
    );
    c.out
}

impl Classifier<'_> {
    fn excluded(&self, bi: usize) -> bool {
        (self.opts.exclude_axon && self.tree.is_axon(bi, true))
            || (self.opts.exclude_basal && self.tree.is_basal(bi, true))
    }

    fn is_empty(&self, bi: usize) -> bool {
        self.tree.branch_at(bi).map_or(true, |b| b.is_empty())
    }

    fn visit(&mut self, bi: usize) {
        if std::mem::replace(&mut self.visited[bi], true) {
            return;
        }
        let tree = self.tree;
        let Some(branch) = tree.branch_at(bi) else {
            return;
        };
        if branch.is_empty() || self.excluded(bi) {
            self.out.set(bi, FiloState::Absent, BTreeSet::new());
            return;
        }
        if !tree.branch_has_children(bi) && branch.any_annotation("lam") {
            self.out.set(bi, FiloState::BranchOnly, BTreeSet::new());
            return;
        }

        let (total, to_last_branch) = tree.branch_world_lengths(bi, self.pixel_sizes);
        let cum = tree.cumulative_world_lengths(bi, self.pixel_sizes);
        let last = branch.points.len() - 1;

        let mut force_interstitial = false;
        let mut terminal_children: Vec<usize> = Vec::new();
        let mut tip_filo: Option<usize> = None;

        for (pi, p) in branch.points.iter().enumerate() {
            let kids = tree.child_branch_indices(&p.id);
            let lone_tip_child = pi == last && kids.len() == 1;
            for c in kids {
                if self.visited[c] {
                    continue;
                }
                if self.is_empty(c) {
                    self.visited[c] = true;
                    continue;
                }
                let (child_is_filo, _) = tree.is_filo(c, self.opts.filo_dist, self.pixel_sizes);
                // Long children demote earlier terminals even when excluded;
                // the visit leaves an excluded child Absent.
                if !child_is_filo {
                    self.visit(c);
                    force_interstitial = true;
                    for t in terminal_children.drain(..) {
                        if self.out.states[t] == FiloState::Terminal {
                            self.out.states[t] = FiloState::Interstitial;
                        }
                    }
                    continue;
                }

                self.visited[c] = true;
                if self.excluded(c) {
                    continue;
                }
                if lone_tip_child {
                    match self.opts.tip_filopodium {
                        TipFilopodium::TerminalOfParent => {
                            self.out.set(c, FiloState::Terminal, BTreeSet::new());
                            tip_filo = Some(c);
                        }
                        TipFilopodium::ContinuesBranch => {
                            self.out.set(c, FiloState::BranchOnly, BTreeSet::from([bi]));
                        }
                    }
                    continue;
                }
                let to_tip = total - cum[pi];
                if to_tip < self.opts.terminal_dist {
                    self.out.set(c, FiloState::Terminal, BTreeSet::new());
                    terminal_children.push(c);
                } else {
                    self.out.set(c, FiloState::Interstitial, BTreeSet::new());
                }
            }
        }

        let ends_in_filo = if force_interstitial {
            FiloState::BranchWithInterstitial
        } else {
            FiloState::BranchWithTerminal
        };

        if let Some(c) = tip_filo {
            self.out.set(bi, ends_in_filo, BTreeSet::from([c]));
            return;
        }

        let tail = total - to_last_branch;
        if tail > 0.0 && tail < self.opts.filo_dist {
            let master = branch
                .points
                .iter()
                .rev()
                .map(|p| tree.child_branch_indices(&p.id))
                .find(|kids| !kids.is_empty())
                .unwrap_or_default();
            self.out.set(bi, ends_in_filo, master.into_iter().collect());
        } else if tail <= 0.0 {
            let master = tree.child_branch_indices(&branch.points[last].id);
            self.out.set(bi, FiloState::BranchOnly, master.into_iter().collect());
        } else {
            self.out.set(bi, FiloState::BranchOnly, BTreeSet::from([bi]));
        }
    }
}
