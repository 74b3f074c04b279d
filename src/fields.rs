//! Field catalog: repeating sections, display labels and tracked metrics.

/// A repeating section of the daily form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RepeatingSection {
    Irrigation,
    Nutrient,
    Pest,
    Incident,
}

impl RepeatingSection {
    pub const ALL: [RepeatingSection; 4] = [
        RepeatingSection::Irrigation,
        RepeatingSection::Nutrient,
        RepeatingSection::Pest,
        RepeatingSection::Incident,
    ];

    /// Data key holding the section's rows.
    pub fn key(self) -> &'static str {
        match self {
            RepeatingSection::Irrigation => "irrigation",
            RepeatingSection::Nutrient => "nutrient",
            RepeatingSection::Pest => "pest",
            RepeatingSection::Incident => "incident",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RepeatingSection::Irrigation => "Bewaesserung & Substrat",
            RepeatingSection::Nutrient => "Naehrloesung",
            RepeatingSection::Pest => "Schaedlingsmonitoring",
            RepeatingSection::Incident => "Alarme & Ereignisse",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.key() == key)
    }
}

/// A numeric field whose direction over time is tracked.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrendMetric {
    pub key: &'static str,
    pub unit: &'static str,
    /// Explicit tolerance; negative values are ignored.
    pub tolerance: Option<f64>,
}

impl TrendMetric {
    pub const fn new(key: &'static str, unit: &'static str) -> Self {
        Self {
            key,
            unit,
            tolerance: None,
        }
    }

    pub const fn with_tolerance(self, tolerance: f64) -> Self {
        Self {
            tolerance: Some(tolerance),
            ..self
        }
    }
}

/// Metrics tracked by the trend analysis.
pub const TREND_METRICS: &[TrendMetric] = &[
    TrendMetric::new("climate_inside_temp_min", "C"),
    TrendMetric::new("climate_inside_temp_max", "C"),
    TrendMetric::new("climate_inside_temp_avg", "C"),
    TrendMetric::new("climate_outside_temp_min", "C"),
    TrendMetric::new("climate_outside_temp_max", "C"),
    TrendMetric::new("climate_outside_temp_avg", "C"),
    TrendMetric::new("climate_rh_min", "%"),
    TrendMetric::new("climate_rh_max", "%"),
    TrendMetric::new("climate_rh_avg", "%"),
    TrendMetric::new("climate_dewpoint_min", "C"),
    TrendMetric::new("climate_dewpoint_max", "C"),
    TrendMetric::new("climate_dewpoint_avg", "C"),
    TrendMetric::new("climate_vpd_min", "kPa"),
    TrendMetric::new("climate_vpd_max", "kPa"),
    TrendMetric::new("climate_vpd_avg", "kPa"),
    TrendMetric::new("climate_co2_min", "ppm"),
    TrendMetric::new("climate_co2_max", "ppm"),
    TrendMetric::new("climate_co2_avg", "ppm"),
    TrendMetric::new("climate_co21000_duration", "min"),
    TrendMetric::new("light_dli_value", "mol m-2 d-1"),
    TrendMetric::new("light_ppfd_value", "umol m-2 s-1"),
    TrendMetric::new("light_hours_value", "h"),
    TrendMetric::new("light_outage_count", "#"),
    TrendMetric::new("pest_traps_count", "#"),
];

/// Display label of a data key.
pub fn humanize_field_name(key: &str) -> String {
    if let Some(label) = known_label(key) {
        return label.to_string();
    }
    if let Some(section) = RepeatingSection::from_key(key) {
        return section.label().to_string();
    }
    title_case(&key.replace('_', " "))
}

fn known_label(key: &str) -> Option<&'static str> {
    let label = match key {
        "meta_date" => "Datum",
        "meta_zone" => "Gewaechshaus / Zone",
        "meta_crop" => "Kultur",
        "meta_responsible" => "Verantwortlich",
        "meta_shift" => "Schicht",
        "climate_inside_temp_min" => "Innen-Temperatur Minimum",
        "climate_inside_temp_max" => "Innen-Temperatur Maximum",
        "climate_inside_temp_avg" => "Innen-Temperatur Durchschnitt",
        "climate_outside_temp_min" => "Aussen-Temperatur Minimum",
        "climate_outside_temp_max" => "Aussen-Temperatur Maximum",
        "climate_outside_temp_avg" => "Aussen-Temperatur Durchschnitt",
        "climate_rh_min" => "Rel. Luftfeuchte Minimum",
        "climate_rh_max" => "Rel. Luftfeuchte Maximum",
        "climate_rh_avg" => "Rel. Luftfeuchte Durchschnitt",
        "climate_dewpoint_min" => "Taupunkt Minimum",
        "climate_dewpoint_max" => "Taupunkt Maximum",
        "climate_dewpoint_avg" => "Taupunkt Durchschnitt",
        "climate_vpd_min" => "VPD Minimum",
        "climate_vpd_max" => "VPD Maximum",
        "climate_vpd_avg" => "VPD Durchschnitt",
        "climate_co2_min" => "CO2 Minimum",
        "climate_co2_max" => "CO2 Maximum",
        "climate_co2_avg" => "CO2 Durchschnitt",
        "climate_co21000_duration" => "CO2 Dauer ueber 1000 ppm",
        "light_dli_value" => "DLI",
        "light_ppfd_value" => "PPFD",
        "light_hours_value" => "Beleuchtungsstunden",
        "light_outage_count" => "Lichtausfaelle",
        "pest_traps_count" => "Fallenanzahl",
        "actions_todo" => "To-do fuer morgen",
        _ => return None,
    };
    Some(label)
}

/// Upper-case the first character of every word.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.push(c);
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_labels() {
        assert_eq!(humanize_field_name("meta_date"), "Datum");
        assert_eq!(humanize_field_name("light_dli_value"), "DLI");
    }

    #[test]
    fn test_section_labels() {
        assert_eq!(humanize_field_name("irrigation"), "Bewaesserung & Substrat");
        assert_eq!(
            RepeatingSection::from_key("incident"),
            Some(RepeatingSection::Incident)
        );
        assert_eq!(RepeatingSection::from_key("climate"), None);
    }

    #[test]
    fn test_fallback_title_case() {
        assert_eq!(humanize_field_name("substrate_ec_in"), "Substrate Ec In");
        assert_eq!(humanize_field_name("notes"), "Notes");
    }

    #[test]
    fn test_metric_table() {
        assert_eq!(TREND_METRICS.len(), 24);
        assert!(TREND_METRICS.iter().all(|m| m.tolerance.is_none()));
        let hours = TREND_METRICS
            .iter()
            .find(|m| m.key == "light_hours_value")
            .unwrap();
        assert_eq!(hours.unit, "h");
    }
}
