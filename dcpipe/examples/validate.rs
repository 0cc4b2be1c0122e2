use dcpipe::{Format, Plane, Rect, Stream, Timing, WritebackInfo};
use drm_fourcc::DrmFourcc;
use std::sync::Arc;

fn main() {
    env_logger::init();

    let dc = dcpipe::Builder::new().build().unwrap();

    let uhd = Timing::from_mode(594000, 3840, 4016, 4104, 4400, 2160, 2168, 2178, 2250);
    let fhd = Timing::from_mode(148500, 1920, 2008, 2052, 2200, 1080, 1084, 1089, 1125);

    let primary = Arc::new(Stream::new(uhd));
    let secondary = Arc::new(Stream::new(fhd).writeback(WritebackInfo::default()));

    let argb = Format::from(DrmFourcc::Argb8888 as u32);
    let nv12 = Format::from(DrmFourcc::Nv12 as u32);

    let mut state = dc.create_state();
    dc.add_stream(&mut state, primary.clone()).unwrap();
    dc.add_stream(&mut state, secondary.clone()).unwrap();

    let full = Rect::new(0, 0, 3840, 2160);
    dc.add_plane(&mut state, &primary, Arc::new(Plane::new(argb, full, full)))
        .unwrap();
    let video = Plane::new(nv12, Rect::new(0, 0, 1280, 720), Rect::new(0, 0, 1920, 1080));
    dc.add_plane(&mut state, &secondary, Arc::new(video)).unwrap();

    dc.commit_state(state).unwrap();

    let current = dc.current_state();
    let clocks = current.clocks();
    println!(
        "level {:?} dispclk {} kHz dppclk {} kHz dcfclk {} kHz",
        current.voltage_level(),
        clocks.dispclk_khz,
        clocks.dppclk_khz,
        clocks.dcfclk_khz,
    );
    for stream in current.streams() {
        let timing = stream.timing();
        let pipes: Vec<usize> = current.stream_pipes(stream).iter().map(|p| p.index()).collect();
        println!(
            "  {}x{}: pipes {:?}",
            timing.h_addressable, timing.v_addressable, pipes
        );
    }
    let wm = &current.watermarks().a;
    println!(
        "  wm a: urgent {} ns pstate {} ns",
        wm.urgent_ns, wm.pstate_change_ns
    );
    for params in current.mcif_arb_params() {
        println!(
            "  writeback: time per pixel {} max scaled time {}",
            params.time_per_pixel, params.max_scaled_time
        );
    }
}
