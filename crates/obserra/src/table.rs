use obserra_core::ServiceDetail;

pub struct ServiceTable {
    id_width: usize,
    name_width: usize,
    app_width: usize,
    version_width: usize,
    status_width: usize,
    memory_width: usize,
    cpu_width: usize,
    uptime_width: usize,
}

impl ServiceTable {
    pub fn new(services: &[ServiceDetail]) -> Self {
        let width = |f: fn(&ServiceDetail) -> usize, header: usize, max: usize| {
            services
                .iter()
                .map(f)
                .max()
                .unwrap_or(header)
                .clamp(header, max)
        };

        Self {
            id_width: width(|s| s.id.chars().count(), 2, 36),
            name_width: width(|s| s.name.chars().count(), 4, 30),
            app_width: width(|s| s.app.chars().count(), 3, 30),
            version_width: width(|s| s.version.as_deref().map_or(1, |v| v.chars().count()), 7, 16),
            status_width: 7,
            memory_width: 19,
            cpu_width: 6,
            uptime_width: 11,
        }
    }

    pub fn print_table(&self, services: &[ServiceDetail]) {
        println!("{}", self.border('┌', '┬', '┐'));
        println!(
            "{}",
            self.row(["ID", "Name", "App", "Version", "Status", "Memory", "CPU", "Uptime"])
        );
        println!("{}", self.border('├', '┼', '┤'));
        for service in services {
            let memory = format!(
                "{} / {}",
                format_bytes(service.metrics.memory.used),
                format_bytes(service.metrics.memory.max)
            );
            let cpu = format!("{:.1}%", service.metrics.cpu.used);
            let uptime = format_uptime(service.metrics.uptime.seconds);
            let status = service.status.to_string();
            println!(
                "{}",
                self.row([
                    &service.id,
                    &service.name,
                    &service.app,
                    service.version.as_deref().unwrap_or("-"),
                    &status,
                    &memory,
                    &cpu,
                    &uptime,
                ])
            );
        }
        println!("{}", self.border('└', '┴', '┘'));
    }

    fn widths(&self) -> [usize; 8] {
        [
            self.id_width,
            self.name_width,
            self.app_width,
            self.version_width,
            self.status_width,
            self.memory_width,
            self.cpu_width,
            self.uptime_width,
        ]
    }

    fn row(&self, cells: [&str; 8]) -> String {
        let parts: Vec<String> = cells
            .iter()
            .zip(self.widths())
            .map(|(cell, width)| format!(" {:<width$} ", truncate(cell, width), width = width))
            .collect();
        format!("│{}│", parts.join("│"))
    }

    fn border(&self, left: char, middle: char, right: char) -> String {
        let parts: Vec<String> = self.widths().iter().map(|w| "─".repeat(w + 2)).collect();
        format!("{}{}{}", left, parts.join(&middle.to_string()), right)
    }
}

pub fn truncate(s: &str, max_len: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

/// Human-readable byte size with 1024-based units.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

pub fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;
    match (days, hours) {
        (0, 0) if minutes == 0 => format!("{}s", seconds),
        (0, 0) => format!("{}m", minutes),
        (0, _) => format!("{}h {}m", hours, minutes),
        _ => format!("{}d {}h", days, hours),
    }
}
