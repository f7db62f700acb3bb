use bitflags::bitflags;

bitflags! {
    /// Vehicle light word, bit values matching the simulator's enumeration.
    ///
    /// `BRAKE` and `REVERSE` are derived automatically from the control
    /// state each frame; every other bit changes only through an explicit
    /// toggle action.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct LightState: u32 {
        const NONE = 0;
        const POSITION = 1;
        const LOW_BEAM = 1 << 1;
        const HIGH_BEAM = 1 << 2;
        const BRAKE = 1 << 3;
        const RIGHT_BLINKER = 1 << 4;
        const LEFT_BLINKER = 1 << 5;
        const REVERSE = 1 << 6;
        const FOG = 1 << 7;
        const INTERIOR = 1 << 8;
        const SPECIAL_1 = 1 << 9;
        const SPECIAL_2 = 1 << 10;
    }
}

impl LightState {
    /// Advances the position/low-beam/fog group one step:
    /// off -> position -> position+low beam -> position+low beam+fog -> off.
    pub fn next_group(self) -> Self {
        let mut next = self;
        if !next.contains(LightState::POSITION) {
            next |= LightState::POSITION;
        } else if !next.contains(LightState::LOW_BEAM) {
            next |= LightState::LOW_BEAM;
        } else if !next.contains(LightState::FOG) {
            next |= LightState::FOG;
        } else {
            next &= !(LightState::POSITION | LightState::LOW_BEAM | LightState::FOG);
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_values_match_server_enum() {
        assert_eq!(LightState::POSITION.bits(), 0x1);
        assert_eq!(LightState::BRAKE.bits(), 0x8);
        assert_eq!(LightState::REVERSE.bits(), 0x40);
        assert_eq!(LightState::SPECIAL_2.bits(), 0x400);
    }

    #[test]
    fn group_cycle_returns_to_off() {
        let mut s = LightState::NONE;
        s = s.next_group();
        assert_eq!(s, LightState::POSITION);
        s = s.next_group();
        assert_eq!(s, LightState::POSITION | LightState::LOW_BEAM);
        s = s.next_group();
        assert_eq!(
            s,
            LightState::POSITION | LightState::LOW_BEAM | LightState::FOG
        );
        s = s.next_group();
        assert_eq!(s, LightState::NONE);
    }

    #[test]
    fn group_cycle_preserves_unrelated_bits() {
        let s = (LightState::INTERIOR | LightState::POSITION | LightState::LOW_BEAM
            | LightState::FOG)
            .next_group();
        assert!(s.contains(LightState::INTERIOR));
        assert!(!s.contains(LightState::POSITION));
    }
}
