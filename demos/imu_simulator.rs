// IMU simulator: publishes samples of a board slowly rocking and turning, so the runtime's
// attitude telemetry can be watched without hardware.
//
// Usage: cargo run --example imu_simulator -- [rate_hz]

use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::{debug, info};

use rover_zenoh_runtime::config::TOPIC_HW_IMU;
use rover_zenoh_runtime::messages::ImuSample;

const G: f32 = 9.80665;
const FIELD_UT: f32 = 45.0; // horizontal field strength
const FIELD_DOWN_UT: f32 = -40.0;
const ROCK_AMPLITUDE_DEG: f32 = 15.0;
const ROCK_PERIOD_S: f32 = 4.0;
const TURN_RATE_DEG_S: f32 = 10.0;
const PRESSURE_PA: f32 = 100_129.0; // ~100 m above sea level
const TEMPERATURE_C: f32 = 18.0;

/// Sample for a board pitched by `pitch_deg` about x with heading `heading_deg`
fn sample_at(pitch_deg: f32, heading_deg: f32, pitch_rate: f32) -> ImuSample {
    let (sin_p, cos_p) = pitch_deg.to_radians().sin_cos();
    let (sin_h, cos_h) = heading_deg.to_radians().sin_cos();

    // Gravity rotated into the body frame
    let accel = [0.0, G * sin_p, G * cos_p];

    // Horizontal field rotated by heading, vertical component tilted with the board
    let mag_x = FIELD_UT * cos_h;
    let mag_h = FIELD_UT * sin_h;
    let mag = [
        mag_x,
        mag_h * cos_p + FIELD_DOWN_UT * sin_p,
        -mag_h * sin_p + FIELD_DOWN_UT * cos_p,
    ];

    ImuSample {
        accel,
        mag,
        gyro: [pitch_rate, 0.0, TURN_RATE_DEG_S.to_radians()],
        pressure_pa: PRESSURE_PA,
        temperature_c: TEMPERATURE_C,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().unwrap()),
        )
        .init();

    let rate_hz: u64 = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .filter(|&hz| hz > 0)
        .unwrap_or(50);

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_HW_IMU).await?;
    info!("Publishing simulated IMU samples to {} at {}Hz", TOPIC_HW_IMU, rate_hz);

    let start = Instant::now();
    let mut tick = interval(Duration::from_millis(1000 / rate_hz));

    loop {
        tick.tick().await;

        let t = start.elapsed().as_secs_f32();
        let phase = t * std::f32::consts::TAU / ROCK_PERIOD_S;
        let pitch = ROCK_AMPLITUDE_DEG * phase.sin();
        let pitch_rate =
            (ROCK_AMPLITUDE_DEG * phase.cos() * std::f32::consts::TAU / ROCK_PERIOD_S).to_radians();
        let heading = (t * TURN_RATE_DEG_S) % 360.0;

        let sample = sample_at(pitch, heading, pitch_rate);
        debug!("Sample: {:?}", sample);
        publisher.put(serde_json::to_string(&sample)?).await?;
    }
}
