//! Human-readable rendering of events.

use hearth_core::event::DeviceEvent;

/// Split a camelCase attribute name on capital-letter boundaries and
/// lowercase the result: `switchLevel` becomes `switch level`.
pub fn split_camel_case(attribute: &str) -> String {
    let mut out = String::with_capacity(attribute.len() + 4);
    for (i, c) in attribute.chars().enumerate() {
        if c.is_uppercase() && i > 0 {
            out.push(' ');
        }
        out.extend(c.to_lowercase());
    }
    out
}

/// Render one event.
///
/// The platform-provided display text wins when present. Otherwise
/// the line is `<attribute>: <value><unit>`, preferring translated
/// attribute and value when the platform supplied them. The component
/// is rendered only when it is not `main`.
pub fn humanize_event(event: &DeviceEvent) -> String {
    let body = match &event.text {
        Some(text) => text.clone(),
        None => {
            let attribute = match &event.translated_attribute {
                Some(translated) => translated.clone(),
                None => split_camel_case(&event.attribute),
            };
            let value = match &event.translated_value {
                Some(translated) => translated.clone(),
                None => event.value.to_string(),
            };
            let unit = event.unit.as_deref().unwrap_or("");
            format!("{attribute}: {value}{unit}")
        }
    };
    if event.is_main_component() {
        body
    } else {
        format!("[{}] {body}", event.component)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use hearth_core::capability::Capability;
    use hearth_core::event::EventValue;
    use hearth_core::ids::{DeviceId, Platform};

    fn event(attribute: &str, value: EventValue) -> DeviceEvent {
        DeviceEvent::new(
            DeviceId::new(Platform::Virtual, "d1").unwrap(),
            Utc.with_ymd_and_hms(2026, 7, 1, 8, 0, 0).unwrap(),
            Capability::Switch,
            attribute,
            value,
        )
    }

    #[test]
    fn test_camel_case_split() {
        assert_eq!(split_camel_case("switch"), "switch");
        assert_eq!(split_camel_case("switchLevel"), "switch level");
        assert_eq!(split_camel_case("thermostatOperatingState"), "thermostat operating state");
    }

    #[test]
    fn test_platform_text_wins() {
        let e = event("switch", "on".into()).with_text("Switch turned on");
        assert_eq!(humanize_event(&e), "Switch turned on");
    }

    #[test]
    fn test_attribute_value_unit() {
        let e = event("battery", EventValue::Integer(85)).with_unit("%");
        assert_eq!(humanize_event(&e), "battery: 85%");
    }

    #[test]
    fn test_component_rendered_when_not_main() {
        let e = event("switch", "on".into()).with_component("leftButton");
        assert_eq!(humanize_event(&e), "[leftButton] switch: on");

        let e = event("switch", "on".into());
        assert_eq!(humanize_event(&e), "switch: on");
    }

    #[test]
    fn test_translations_preferred() {
        let mut e = event("switchLevel", EventValue::Integer(40));
        e.translated_attribute = Some("Helligkeit".to_string());
        e.translated_value = Some("40 Prozent".to_string());
        assert_eq!(humanize_event(&e), "Helligkeit: 40 Prozent");
    }
}
