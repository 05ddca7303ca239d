//! Record the system playback mix to a WAV file until Enter is pressed.
//!
//! ```text
//! loopback-tap --list
//! loopback-tap <output.wav> [config.json] [endpoint-id]
//! ```

#[cfg(target_os = "windows")]
fn main() {
    env_logger::init();

    if let Err(e) = run(std::env::args().skip(1).collect()) {
        log::error!("loopback-tap failed: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(target_os = "windows"))]
fn main() {
    env_logger::init();
    log::error!("loopback-tap needs WASAPI loopback and only runs on Windows");
    std::process::exit(1);
}

#[cfg(target_os = "windows")]
fn run(args: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
    use std::io::BufRead;
    use std::path::Path;
    use std::sync::Arc;

    use playback_capture_core::{CaptureConfiguration, CaptureController, ControlCommand, WavTapSink, ACTION_START, ACTION_STOP};
    use playback_capture_windows::{LoopbackGrantAuthority, RenderEndpointEnumerator, WasapiLoopbackBackend};

    if args.first().map(String::as_str) == Some("--list") {
        for endpoint in RenderEndpointEnumerator::new()?.list()? {
            println!("{}", endpoint);
        }
        return Ok(());
    }

    let output = args.first().map_or("loopback-tap.wav", String::as_str);
    let config = match args.get(1) {
        Some(path) => CaptureConfiguration::load(Path::new(path))?,
        None => CaptureConfiguration::default(),
    };
    let backend = match args.get(2) {
        Some(id) => WasapiLoopbackBackend::for_endpoint(id.as_str()),
        None => WasapiLoopbackBackend::default_endpoint(),
    };

    let authority = Arc::new(LoopbackGrantAuthority::new());
    let sink = Arc::new(WavTapSink::create(output, config.format)?);
    let controller = CaptureController::builder(backend, authority.clone(), sink.clone())
        .config(config)
        .spawn()?;

    controller.handle(ControlCommand::parse(ACTION_START, Some(authority.issue()))?)?;
    println!("Recording to {}; press Enter to stop", output);

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;

    controller.handle(ControlCommand::parse(ACTION_STOP, None)?)?;
    let diagnostics = controller.diagnostics();
    drop(controller);
    authority.revoke_all();

    let summary = sink.finish()?;
    let sidecar = summary.write_sidecar()?;
    println!(
        "{}: {:.2}s, {} frames ({} dropped), sha256 {}",
        summary.path.display(),
        summary.duration_secs,
        diagnostics.frames_forwarded,
        diagnostics.forward_failures,
        summary.checksum
    );
    println!("Summary written to {}", sidecar.display());
    Ok(())
}
