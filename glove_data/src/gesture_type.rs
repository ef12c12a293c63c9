//! The fixed registry of moves the game knows about.
//!
//! [`GestureType`] is a plain enum; everything else about a move lives in a
//! static [`GestureProfile`] table indexed by the enum discriminant.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::instance::{GestureInstance, AXES_PER_HAND};

// ════════════════════════════════════════════════════════════════════════════
// Handedness / genre / action
// ════════════════════════════════════════════════════════════════════════════

/// Which gloves a move is made with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Handedness {
    Left,
    Right,
    Both,
}

impl Handedness {
    pub fn uses_left(self) -> bool {
        matches!(self, Handedness::Left | Handedness::Both)
    }

    pub fn uses_right(self) -> bool {
        matches!(self, Handedness::Right | Handedness::Both)
    }

    pub fn num_hands(self) -> usize {
        match self {
            Handedness::Both => 2,
            _ => 1,
        }
    }

    /// Width of an observation row for this handedness.
    pub fn observation_width(self) -> usize {
        self.num_hands() * AXES_PER_HAND
    }

    /// True when the instance carries exactly the hands this handedness uses.
    pub fn matches(self, inst: &GestureInstance) -> bool {
        self.uses_left() == inst.has_left() && self.uses_right() == inst.has_right()
    }
}

/// Informational grouping of moves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GestureGenre {
    Basic,
    Special,
    EasterEgg,
}

/// Token handed to the game model when a move is recognized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Block,
    Jab,
    Hook,
    Uppercut,
    Chop,
    Hadouken,
    Shoryuken,
    SonicBoom,
    DoubleLariat,
    SumoHeadbutt,
    OneHundredHandSlap,
    PsychoCrusher,
    Ymca,
    NyanCat,
}

// ════════════════════════════════════════════════════════════════════════════
// Profile table
// ════════════════════════════════════════════════════════════════════════════

/// Immutable per-move record.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GestureProfile {
    pub name:           &'static str,
    pub handedness:     Handedness,
    pub genre:          GestureGenre,
    pub num_states:     usize,
    pub min_fierceness: f64,
    pub min_samples:    usize,
    pub action:         ActionKind,
}

const fn profile(
    name:           &'static str,
    handedness:     Handedness,
    genre:          GestureGenre,
    num_states:     usize,
    min_fierceness: f64,
    min_samples:    usize,
    action:         ActionKind,
) -> GestureProfile {
    GestureProfile { name, handedness, genre, num_states, min_fierceness, min_samples, action }
}

use ActionKind as A;
use GestureGenre::{Basic, EasterEgg, Special};
use Handedness::{Both, Left, Right};

// Order must follow the `GestureType` discriminants.
static PROFILES: [GestureProfile; 23] = [
    profile("LEFT_BLOCK",                       Left,  Basic,     3, 0.0,     3,  A::Block),
    profile("RIGHT_BLOCK",                      Right, Basic,     3, 0.0,     3,  A::Block),
    profile("TWO_HANDED_BLOCK",                 Both,  Basic,     5, 0.0,     5,  A::Block),
    profile("LEFT_JAB",                         Left,  Basic,     4, 9000.0,  4,  A::Jab),
    profile("LEFT_HOOK",                        Left,  Basic,     4, 16000.0, 4,  A::Hook),
    profile("LEFT_UPPERCUT",                    Left,  Basic,     4, 25000.0, 4,  A::Uppercut),
    profile("LEFT_CHOP",                        Left,  Basic,     4, 0.0,     4,  A::Chop),
    profile("RIGHT_JAB",                        Right, Basic,     4, 9000.0,  4,  A::Jab),
    profile("RIGHT_HOOK",                       Right, Basic,     4, 16000.0, 4,  A::Hook),
    profile("RIGHT_UPPERCUT",                   Right, Basic,     4, 25000.0, 4,  A::Uppercut),
    profile("RIGHT_CHOP",                       Right, Basic,     4, 0.0,     4,  A::Chop),
    profile("HADOUKEN",                         Both,  Special,   5, 0.0,     5,  A::Hadouken),
    profile("LEFT_SHORYUKEN",                   Left,  Special,   4, 0.0,     4,  A::Shoryuken),
    profile("RIGHT_SHORYUKEN",                  Right, Special,   4, 0.0,     4,  A::Shoryuken),
    profile("SONIC_BOOM",                       Both,  Special,   5, 0.0,     5,  A::SonicBoom),
    profile("DOUBLE_LARIAT",                    Both,  Special,   5, 0.0,     5,  A::DoubleLariat),
    profile("SUMO_HEADBUTT",                    Both,  Special,   5, 0.0,     5,  A::SumoHeadbutt),
    profile("LEFT_ONE_HUNDRED_HAND_SLAP",       Left,  Special,   4, 0.0,     16, A::OneHundredHandSlap),
    profile("RIGHT_ONE_HUNDRED_HAND_SLAP",      Right, Special,   4, 0.0,     16, A::OneHundredHandSlap),
    profile("TWO_HANDED_ONE_HUNDRED_HAND_SLAP", Both,  Special,   5, 0.0,     16, A::OneHundredHandSlap),
    profile("PSYCHO_CRUSHER",                   Both,  Special,   5, 0.0,     5,  A::PsychoCrusher),
    profile("YMCA",                             Both,  EasterEgg, 6, 0.0,     24, A::Ymca),
    profile("NYAN_CAT",                         Both,  EasterEgg, 5, 0.0,     5,  A::NyanCat),
];

// ════════════════════════════════════════════════════════════════════════════
// GestureType
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GestureType {
    LeftBlock,
    RightBlock,
    TwoHandedBlock,
    LeftJab,
    LeftHook,
    LeftUppercut,
    LeftChop,
    RightJab,
    RightHook,
    RightUppercut,
    RightChop,
    Hadouken,
    LeftShoryuken,
    RightShoryuken,
    SonicBoom,
    DoubleLariat,
    SumoHeadbutt,
    LeftOneHundredHandSlap,
    RightOneHundredHandSlap,
    TwoHandedOneHundredHandSlap,
    PsychoCrusher,
    Ymca,
    NyanCat,
}

impl GestureType {
    pub const ALL: [GestureType; 23] = [
        GestureType::LeftBlock,
        GestureType::RightBlock,
        GestureType::TwoHandedBlock,
        GestureType::LeftJab,
        GestureType::LeftHook,
        GestureType::LeftUppercut,
        GestureType::LeftChop,
        GestureType::RightJab,
        GestureType::RightHook,
        GestureType::RightUppercut,
        GestureType::RightChop,
        GestureType::Hadouken,
        GestureType::LeftShoryuken,
        GestureType::RightShoryuken,
        GestureType::SonicBoom,
        GestureType::DoubleLariat,
        GestureType::SumoHeadbutt,
        GestureType::LeftOneHundredHandSlap,
        GestureType::RightOneHundredHandSlap,
        GestureType::TwoHandedOneHundredHandSlap,
        GestureType::PsychoCrusher,
        GestureType::Ymca,
        GestureType::NyanCat,
    ];

    pub fn profile(self) -> &'static GestureProfile {
        &PROFILES[self as usize]
    }

    pub fn name(self) -> &'static str { self.profile().name }
    pub fn handedness(self) -> Handedness { self.profile().handedness }
    pub fn genre(self) -> GestureGenre { self.profile().genre }
    pub fn num_states(self) -> usize { self.profile().num_states }
    pub fn min_fierceness(self) -> f64 { self.profile().min_fierceness }
    pub fn min_samples(self) -> usize { self.profile().min_samples }
    pub fn action(self) -> ActionKind { self.profile().action }

    pub fn uses_left(self) -> bool { self.handedness().uses_left() }
    pub fn uses_right(self) -> bool { self.handedness().uses_right() }
    pub fn num_hands(self) -> usize { self.handedness().num_hands() }
    pub fn observation_width(self) -> usize { self.handedness().observation_width() }

    /// Reverse of [`GestureType::name`].
    pub fn from_name(name: &str) -> Option<GestureType> {
        GestureType::ALL.into_iter().find(|g| g.name() == name)
    }
}

impl fmt::Display for GestureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
