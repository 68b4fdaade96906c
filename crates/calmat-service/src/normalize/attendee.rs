use calmat_rfc::rfc::ical::core::Property;

use crate::calendar::{Attendee, AttendeeRole, ResponseStatus};

/// Decodes an ATTENDEE or ORGANIZER property.
///
/// Returns `None` when the property carries no address.
#[must_use]
pub fn parse_attendee(prop: &Property) -> Option<Attendee> {
    let raw = prop.as_text().unwrap_or(&prop.raw_value).trim();
    let address = strip_scheme(raw).trim();
    if address.is_empty() {
        return None;
    }

    let name = prop
        .get_param_value("CN")
        .map(|cn| cn.trim().trim_matches('"').to_string())
        .filter(|cn| !cn.is_empty());

    Some(Attendee {
        email: address.to_lowercase(),
        name,
        response: prop
            .get_param_value("PARTSTAT")
            .map_or(ResponseStatus::NeedsAction, parse_partstat),
        role: prop
            .get_param_value("ROLE")
            .map_or(AttendeeRole::Required, parse_role),
    })
}

fn strip_scheme(value: &str) -> &str {
    match value.split_once(':') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("mailto") => rest,
        _ => value,
    }
}

fn parse_partstat(value: &str) -> ResponseStatus {
    match value.to_ascii_uppercase().as_str() {
        "NEEDS-ACTION" => ResponseStatus::NeedsAction,
        "ACCEPTED" => ResponseStatus::Accepted,
        "DECLINED" => ResponseStatus::Declined,
        "TENTATIVE" => ResponseStatus::Tentative,
        "DELEGATED" => ResponseStatus::Delegated,
        _ => ResponseStatus::Other,
    }
}

fn parse_role(value: &str) -> AttendeeRole {
    match value.to_ascii_uppercase().as_str() {
        "CHAIR" => AttendeeRole::Chair,
        "REQ-PARTICIPANT" => AttendeeRole::Required,
        "OPT-PARTICIPANT" => AttendeeRole::Optional,
        "NON-PARTICIPANT" => AttendeeRole::NonParticipant,
        _ => AttendeeRole::Other,
    }
}
