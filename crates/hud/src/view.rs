use drivekit_common::{ControlCommand, Telemetry};
use tracing::debug;

/// Default notification lifetime in seconds.
const NOTIFICATION_SECONDS: f32 = 2.0;
/// Notifications fade out over their last half second.
const FADE_SECONDS: f32 = 0.5;

/// A short-lived notification line.
#[derive(Debug, Default)]
pub struct FadingText {
    text: String,
    seconds_left: f32,
}

impl FadingText {
    pub fn set(&mut self, text: impl Into<String>, seconds: f32) {
        self.text = text.into();
        self.seconds_left = seconds;
    }

    pub fn tick(&mut self, dt: f32) {
        self.seconds_left = (self.seconds_left - dt).max(0.0);
    }

    pub fn visible(&self) -> Option<&str> {
        (self.seconds_left > 0.0).then_some(self.text.as_str())
    }

    /// Opacity in `[0, 1]`, linear over the fade window.
    pub fn alpha(&self) -> f32 {
        (self.seconds_left / FADE_SECONDS).min(1.0)
    }
}

/// The toggleable help overlay, populated from the binding table.
#[derive(Debug)]
pub struct HelpPanel {
    pub visible: bool,
    text: String,
}

impl Default for HelpPanel {
    fn default() -> Self {
        Self {
            visible: false,
            text: drivekit_control::help_text(),
        }
    }
}

impl HelpPanel {
    pub fn toggle(&mut self) {
        self.visible = !self.visible;
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// HUD view state for one session.
#[derive(Debug)]
pub struct Hud {
    pub width: u32,
    pub height: u32,
    show_info: bool,
    pub notification: FadingText,
    pub help: HelpPanel,
}

impl Hud {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            show_info: true,
            notification: FadingText::default(),
            help: HelpPanel::default(),
        }
    }

    pub fn toggle_info(&mut self) {
        self.show_info = !self.show_info;
    }

    pub fn show_info(&self) -> bool {
        self.show_info
    }

    /// Posts a notification with the default lifetime.
    pub fn notify(&mut self, text: impl Into<String>) {
        self.notify_for(text, NOTIFICATION_SECONDS);
    }

    pub fn notify_for(&mut self, text: impl Into<String>, seconds: f32) {
        let text = text.into();
        debug!(%text, "hud notification");
        self.notification.set(text, seconds);
    }

    pub fn tick(&mut self, dt: f32) {
        self.notification.tick(dt);
    }

    /// Formats the left-hand telemetry block.
    pub fn info_lines(&self, t: &Telemetry, command: &ControlCommand) -> Vec<String> {
        let loc = t.transform.location;
        let mut lines = vec![
            format!("Server:  {:16.0} FPS", t.server_fps),
            format!("Client:  {:16.0} FPS", t.client_fps),
            String::new(),
            format!("Actor:   {:20}", t.actor_name),
            format!("Map:     {:20}", t.map_name),
            String::new(),
            format!("Speed:   {:15.0} km/h", t.speed_kmh()),
            format!(
                "Heading: {:16.0}\u{b0} {}",
                t.transform.rotation.yaw,
                compass(t.transform.rotation.yaw)
            ),
            format!("Location:{:>20}", format!("({:5.1}, {:5.1})", loc.x, loc.y)),
            format!("Height:  {:18.0} m", loc.z),
            String::new(),
        ];

        match command {
            ControlCommand::Vehicle(v) => {
                lines.push(format!("Throttle: {:15.2}", v.throttle));
                lines.push(format!("Steer:    {:15.2}", v.steer));
                lines.push(format!("Brake:    {:15.2}", v.brake));
                lines.push(format!("Reverse:  {:>15}", on_off(v.reverse)));
                lines.push(format!("Hand brake: {:>13}", on_off(v.hand_brake)));
                lines.push(format!("Manual:   {:>15}", on_off(v.manual_gear_shift)));
                lines.push(format!("Gear:     {:>15}", gear_label(v.gear)));
            }
            ControlCommand::Walker(w) => {
                lines.push(format!("Speed:   {:15.3} m/s", w.speed));
                lines.push(format!("Jump:    {:>16}", on_off(w.jump)));
            }
        }
        lines
    }
}

fn on_off(value: bool) -> &'static str {
    if value { "On" } else { "Off" }
}

fn gear_label(gear: i32) -> String {
    match gear {
        -1 => "R".to_string(),
        0 => "N".to_string(),
        n => n.to_string(),
    }
}

/// Compass letters for a yaw angle in degrees.
fn compass(yaw: f32) -> String {
    let mut heading = String::new();
    if yaw.abs() < 89.5 {
        heading.push('N');
    }
    if yaw.abs() > 90.5 {
        heading.push('S');
    }
    if (0.5..179.5).contains(&yaw) {
        heading.push('E');
    }
    if (-179.5..-0.5).contains(&yaw) {
        heading.push('W');
    }
    heading
}

#[cfg(test)]
mod tests {
    use super::*;
    use drivekit_common::{VehicleControl, WalkerControl};
    use glam::Vec3;

    #[test]
    fn notification_expires_after_its_lifetime() {
        let mut hud = Hud::new(1280, 720);
        hud.notify_for("Press 'H' or '?' for help.", 4.0);
        assert!(hud.notification.visible().is_some());
        hud.tick(3.9);
        assert!(hud.notification.visible().is_some());
        hud.tick(0.2);
        assert!(hud.notification.visible().is_none());
    }

    #[test]
    fn notification_fades_near_the_end() {
        let mut hud = Hud::new(1280, 720);
        hud.notify("Autopilot On");
        assert_eq!(hud.notification.alpha(), 1.0);
        hud.tick(1.75);
        assert!(hud.notification.alpha() < 1.0);
        assert!(hud.notification.alpha() > 0.0);
    }

    #[test]
    fn vehicle_info_includes_control_block() {
        let hud = Hud::new(1280, 720);
        let telemetry = Telemetry {
            velocity: Vec3::new(10.0, 0.0, 0.0),
            actor_name: "Mustang".to_string(),
            map_name: "Town03".to_string(),
            ..Telemetry::default()
        };
        let command = ControlCommand::Vehicle(VehicleControl {
            gear: -1,
            reverse: true,
            ..VehicleControl::default()
        });
        let lines = hud.info_lines(&telemetry, &command);
        let text = lines.join("\n");
        assert!(text.contains("36 km/h"));
        assert!(text.contains("Mustang"));
        assert!(text.contains("Gear:"));
        assert!(text.contains('R'));
    }

    #[test]
    fn walker_info_shows_speed_and_jump() {
        let hud = Hud::new(800, 600);
        let command = ControlCommand::Walker(WalkerControl {
            speed: 1.589,
            jump: true,
            ..WalkerControl::default()
        });
        let text = hud.info_lines(&Telemetry::default(), &command).join("\n");
        assert!(text.contains("1.589 m/s"));
        assert!(text.contains("Jump:"));
        assert!(!text.contains("Throttle"));
    }

    #[test]
    fn compass_quadrants() {
        assert_eq!(compass(0.0), "N");
        assert_eq!(compass(45.0), "NE");
        assert_eq!(compass(135.0), "SE");
        assert_eq!(compass(-135.0), "SW");
        assert_eq!(compass(180.0), "S");
    }

    #[test]
    fn help_panel_carries_binding_table_text() {
        let mut hud = Hud::new(1280, 720);
        assert!(!hud.help.visible);
        hud.help.toggle();
        assert!(hud.help.visible);
        assert!(hud.help.text().contains("toggle autopilot"));
    }
}
