// Copyright 2024 Google LLC
// SPDX-License-Identifier: MIT

//! Clock and watermark results.

use super::dml::{Vba, Watermarks};

/// The global clocks of a validated configuration.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct ClockState {
    pub dispclk_khz: u32,
    /// The highest scaler clock required by any pipe.
    pub dppclk_khz: u32,
    pub dcfclk_khz: u32,
    pub socclk_khz: u32,
    pub dramclk_khz: u32,
    pub dcfclk_deep_sleep_khz: u32,
    pub fclk_khz: u32,
    /// Whether the DRAM clock may change during vertical blank.
    pub p_state_change_support: bool,
}

/// One set of watermarks in nanoseconds.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct WatermarkSet {
    pub urgent_ns: u32,
    pub cstate_enter_plus_exit_ns: u32,
    pub cstate_exit_ns: u32,
    pub pstate_change_ns: u32,
    pub pte_meta_urgent_ns: u32,
}

impl From<&Watermarks> for WatermarkSet {
    fn from(wm: &Watermarks) -> Self {
        let ns = |us: f64| (us * 1000.0) as u32;
        Self {
            urgent_ns: ns(wm.urgent),
            cstate_enter_plus_exit_ns: ns(wm.stutter_enter_exit),
            cstate_exit_ns: ns(wm.stutter_exit),
            pstate_change_ns: ns(wm.dram_clock_change),
            pte_meta_urgent_ns: ns(wm.memory_trip),
        }
    }
}

/// The four watermark sets, from the highest clock state `a` to the lowest `d`.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct WatermarkSets {
    pub a: WatermarkSet,
    pub b: WatermarkSet,
    pub c: WatermarkSet,
    pub d: WatermarkSet,
}

impl WatermarkSets {
    /// Returns the sets in order.
    pub fn as_array(&self) -> [WatermarkSet; 4] {
        [self.a, self.b, self.c, self.d]
    }

    pub(crate) fn set_mut(&mut self, idx: usize) -> &mut WatermarkSet {
        match idx {
            0 => &mut self.a,
            1 => &mut self.b,
            2 => &mut self.c,
            _ => &mut self.d,
        }
    }
}

/// Reads the final clocks out of the calculator state.
///
/// The scaler clock is left at zero for the caller to fill in from the pipes.
pub(crate) fn extract_clocks(vba: &Vba, vlevel: usize) -> ClockState {
    let khz = |mhz: f64| (mhz * 1000.0) as u32;
    let p_state_change_support = vba
        .dram_clock_change_support
        .get(vlevel)
        .map_or(false, |support| support[vba.max_mpc_comb.min(1)]);

    ClockState {
        dispclk_khz: khz(vba.dispclk),
        dppclk_khz: 0,
        dcfclk_khz: khz(vba.dcfclk),
        socclk_khz: khz(vba.socclk),
        dramclk_khz: khz(vba.dram_speed),
        dcfclk_deep_sleep_khz: khz(vba.dcfclk_deep_sleep),
        fclk_khz: khz(vba.fabric_clock),
        p_state_change_support,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watermark_set() {
        let wm = Watermarks {
            urgent: 4.5,
            stutter_enter_exit: 11.0,
            stutter_exit: 8.7,
            dram_clock_change: 408.5,
            memory_trip: 4.0,
            ..Default::default()
        };
        let set = WatermarkSet::from(&wm);
        assert_eq!(set.urgent_ns, 4500);
        assert_eq!(set.pstate_change_ns, 408500);
        assert_eq!(set.pte_meta_urgent_ns, 4000);

        let mut sets = WatermarkSets::default();
        *sets.set_mut(3) = set;
        assert_eq!(sets.d, set);
        assert_eq!(sets.as_array()[0], WatermarkSet::default());
    }

    #[test]
    fn test_extract_clocks() {
        let mut vba = Vba::default();
        vba.reset(2, 1);
        vba.dispclk = 600.5;
        vba.dcfclk = 506.0;
        vba.fabric_clock = 506.0;
        vba.dram_speed = 8000.0;
        vba.dram_clock_change_support[1] = [true, false];

        let clk = extract_clocks(&vba, 1);
        assert_eq!(clk.dispclk_khz, 600500);
        assert_eq!(clk.dcfclk_khz, 506000);
        assert_eq!(clk.dramclk_khz, 8000000);
        assert_eq!(clk.dppclk_khz, 0);
        assert!(clk.p_state_change_support);

        vba.max_mpc_comb = 1;
        assert!(!extract_clocks(&vba, 1).p_state_change_support);
        assert!(!extract_clocks(&vba, 5).p_state_change_support);
    }
}
