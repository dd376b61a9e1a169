//! Draft merging: one pattern draft, one optional LLM draft, one profile.
//!
//! Precedence: the LLM wins scalar fields when it produced something
//! non-empty; list fields keep the LLM's order and enrichment first, then
//! append pattern items whose normalized name was not already seen, so the
//! pattern pass's long-tail coverage (paginated price lists) survives.

use siteprofiler_shared::types::{BusinessProfile, BusinessProfileDraft};

/// Merge the two extraction drafts into the final profile.
///
/// With no LLM draft the pattern draft passes through unchanged.
pub fn merge(pattern: BusinessProfileDraft, llm: Option<BusinessProfileDraft>) -> BusinessProfile {
    let Some(llm) = llm else {
        return promote(pattern);
    };

    let services = merge_by_name(
        llm.services,
        pattern.services,
        |service| service.name.trim().to_lowercase(),
    );
    let staff = merge_by_name(llm.staff, pattern.staff, |member| {
        member.name.trim().to_lowercase()
    });

    BusinessProfile {
        name: pick(llm.name, pattern.name),
        address: pick(llm.address, pattern.address),
        phone: pick(llm.phone, pattern.phone),
        email: pick(llm.email, pattern.email),
        hours: if llm.hours.is_empty() {
            pattern.hours
        } else {
            llm.hours
        },
        services,
        staff,
        free_text_excerpt: pattern.free_text_excerpt.or(llm.free_text_excerpt),
        about: llm.about.unwrap_or_default(),
        benefits: llm.benefits.unwrap_or_default(),
        faq: llm.faq.unwrap_or_default(),
    }
}

/// Pattern draft as-is; free-text positioning fields stay empty.
fn promote(pattern: BusinessProfileDraft) -> BusinessProfile {
    BusinessProfile {
        name: pattern.name,
        address: pattern.address,
        phone: pattern.phone,
        email: pattern.email,
        hours: pattern.hours,
        services: pattern.services,
        staff: pattern.staff,
        free_text_excerpt: pattern.free_text_excerpt,
        about: pattern.about.unwrap_or_default(),
        benefits: pattern.benefits.unwrap_or_default(),
        faq: pattern.faq.unwrap_or_default(),
    }
}

fn pick(llm: Option<String>, pattern: Option<String>) -> Option<String> {
    llm.filter(|value| !value.trim().is_empty()).or(pattern)
}

/// LLM items first in their own order, then pattern items whose normalized
/// name was not already present.
fn merge_by_name<T, F: Fn(&T) -> String>(llm: Vec<T>, pattern: Vec<T>, key: F) -> Vec<T> {
    let mut seen: std::collections::HashSet<String> = llm.iter().map(&key).collect();
    let mut merged = llm;
    for item in pattern {
        if seen.insert(key(&item)) {
            merged.push(item);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    use siteprofiler_shared::types::{ServiceEntry, StaffEntry};

    fn service(name: &str, price: Option<&str>) -> ServiceEntry {
        ServiceEntry {
            name: name.into(),
            price: price.map(str::to_string),
            category: None,
        }
    }

    fn pattern_draft() -> BusinessProfileDraft {
        BusinessProfileDraft {
            name: Some("Corner Barbershop".into()),
            address: Some("Hauptstraße 12, Berlin".into()),
            phone: Some("+49 30 111111".into()),
            email: Some("hi@corner.example".into()),
            hours: vec!["Mon - Fri 9:00 - 18:00".into()],
            services: vec![service("Haircut", Some("20€")), service("Beard trim", Some("10€"))],
            staff: vec![StaffEntry {
                name: "Jane Doe".into(),
                role: Some("Master Barber".into()),
            }],
            free_text_excerpt: Some("Welcome to the shop".into()),
            about: None,
            benefits: None,
            faq: None,
        }
    }

    #[test]
    fn missing_llm_draft_is_the_identity() {
        let pattern = pattern_draft();
        let profile = merge(pattern.clone(), None);

        assert_eq!(profile.name, pattern.name);
        assert_eq!(profile.address, pattern.address);
        assert_eq!(profile.phone, pattern.phone);
        assert_eq!(profile.email, pattern.email);
        assert_eq!(profile.hours, pattern.hours);
        assert_eq!(profile.services, pattern.services);
        assert_eq!(profile.staff, pattern.staff);
        assert_eq!(profile.free_text_excerpt, pattern.free_text_excerpt);
        assert!(profile.about.is_empty());
        assert!(profile.benefits.is_empty());
        assert!(profile.faq.is_empty());
    }

    #[test]
    fn non_empty_llm_scalars_win() {
        let llm = BusinessProfileDraft {
            name: Some("Corner Barbershop GmbH".into()),
            phone: Some("   ".into()),
            ..Default::default()
        };
        let profile = merge(pattern_draft(), Some(llm));

        assert_eq!(profile.name.as_deref(), Some("Corner Barbershop GmbH"));
        // Whitespace-only counts as empty; the pattern value survives.
        assert_eq!(profile.phone.as_deref(), Some("+49 30 111111"));
        assert_eq!(profile.address.as_deref(), Some("Hauptstraße 12, Berlin"));
    }

    #[test]
    fn pattern_only_services_are_never_lost() {
        let llm = BusinessProfileDraft {
            services: vec![service("Haircut", Some("22€"))],
            ..Default::default()
        };
        let profile = merge(pattern_draft(), Some(llm));

        // LLM enrichment first (and its price wins the name collision),
        // pattern long tail appended.
        assert_eq!(profile.services.len(), 2);
        assert_eq!(profile.services[0].name, "Haircut");
        assert_eq!(profile.services[0].price.as_deref(), Some("22€"));
        assert_eq!(profile.services[1].name, "Beard trim");
    }

    #[test]
    fn service_name_matching_ignores_case_and_whitespace() {
        let llm = BusinessProfileDraft {
            services: vec![service("  haircut ", None)],
            ..Default::default()
        };
        let profile = merge(pattern_draft(), Some(llm));
        assert_eq!(profile.services.len(), 2);
    }

    #[test]
    fn free_text_fields_come_from_the_llm_only() {
        let llm = BusinessProfileDraft {
            about: Some("Family-run since 1998.".into()),
            faq: Some("Q: Walk-ins? A: Yes.".into()),
            ..Default::default()
        };
        let profile = merge(pattern_draft(), Some(llm));

        assert_eq!(profile.about, "Family-run since 1998.");
        assert!(profile.benefits.is_empty());
        assert_eq!(profile.faq, "Q: Walk-ins? A: Yes.");
        // The excerpt still comes from the pattern pass.
        assert_eq!(profile.free_text_excerpt.as_deref(), Some("Welcome to the shop"));
    }

    #[test]
    fn llm_hours_replace_pattern_hours_when_present() {
        let llm = BusinessProfileDraft {
            hours: vec!["Daily 10:00 - 20:00".into()],
            ..Default::default()
        };
        let profile = merge(pattern_draft(), Some(llm));
        assert_eq!(profile.hours, vec!["Daily 10:00 - 20:00".to_string()]);
    }
}
