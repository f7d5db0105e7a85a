use std::sync::Arc;

use serde_json::{Map, Value};

use crate::{
    error::AppResult,
    repository::table_service::list_rows,
    schemas::{PricingType, ServiceDefinition},
    state::AppState,
};

const CATALOG_CACHE_KEY: &str = "catalog";

/// Built-in catalog used when no database is configured or the `services`
/// table is still empty. Prices are per square meter for `PerUnit` services
/// and per piece for `Fixed` ones; consultations are priced on site.
pub fn default_catalog() -> Vec<ServiceDefinition> {
    let entry = |id: &str,
                 name: &str,
                 pricing_type: PricingType,
                 unit_price: f64,
                 category: &str,
                 description: &str,
                 includes: &[&str]| ServiceDefinition {
        id: id.to_string(),
        name: name.to_string(),
        pricing_type,
        unit_price,
        category: category.to_string(),
        description: description.to_string(),
        includes: includes.iter().map(|item| (*item).to_string()).collect(),
        is_active: true,
    };

    vec![
        entry(
            "mosque_carpets",
            "Mosque carpet washing",
            PricingType::PerUnit,
            7.0,
            "carpets_curtains",
            "Deep steam wash and sanitization for mosque carpeting.",
            &["Deep steam wash", "Certified sanitizers", "Grease spot removal", "Drying"],
        ),
        entry(
            "home_cleaning_deep",
            "Deep home cleaning",
            PricingType::PerUnit,
            14.0,
            "home_cleaning",
            "Full deep clean covering walls, floors, kitchens and built-up grease.",
            &["Floor scrubbing and polish", "Kitchen degreasing", "Bathroom sanitization"],
        ),
        entry(
            "home_cleaning_regular",
            "Regular home cleaning",
            PricingType::PerUnit,
            10.0,
            "home_cleaning",
            "Routine cleaning: dusting, tidying and floor care.",
            &["Dusting", "Bathroom cleaning", "Bed making", "Air freshening"],
        ),
        entry(
            "sofa_steam_cleaning",
            "Sofa steam cleaning",
            PricingType::Fixed,
            150.0,
            "furniture",
            "Per-seat steam cleaning for sofas and armchairs.",
            &["Steam extraction", "Stain treatment", "Fabric-safe detergents"],
        ),
        entry(
            "curtain_steam_cleaning",
            "Curtain steam cleaning",
            PricingType::Fixed,
            120.0,
            "carpets_curtains",
            "In-place steam cleaning per curtain panel.",
            &["In-place steaming", "Odor removal"],
        ),
        entry(
            "marble_polishing",
            "Marble grinding and polishing",
            PricingType::PerUnit,
            30.0,
            "finishing",
            "Mechanical grinding and crystal polishing of marble floors.",
            &["Diamond grinding", "Crystallization", "Edge finishing"],
        ),
        entry(
            "post_construction_visit",
            "Post-construction assessment visit",
            PricingType::Consultation,
            0.0,
            "others",
            "On-site assessment visit; the final price is quoted after inspection.",
            &["Site walkthrough", "Written quotation"],
        ),
    ]
}

/// Load the active service catalog: database-backed when a pool is
/// configured and rows exist, seeded defaults otherwise. Results are cached;
/// admin catalog mutations call [`invalidate_catalog`].
pub async fn load_catalog(state: &AppState) -> AppResult<Arc<Vec<ServiceDefinition>>> {
    if let Some(cached) = state.catalog_cache.get(CATALOG_CACHE_KEY).await {
        return Ok(cached);
    }

    let catalog = Arc::new(fetch_catalog(state).await?);
    state
        .catalog_cache
        .insert(CATALOG_CACHE_KEY.to_string(), catalog.clone())
        .await;
    Ok(catalog)
}

pub async fn invalidate_catalog(state: &AppState) {
    state.catalog_cache.invalidate(CATALOG_CACHE_KEY).await;
}

pub fn find_service<'a>(
    catalog: &'a [ServiceDefinition],
    service_id: &str,
) -> Option<&'a ServiceDefinition> {
    catalog
        .iter()
        .find(|service| service.id == service_id.trim())
}

async fn fetch_catalog(state: &AppState) -> AppResult<Vec<ServiceDefinition>> {
    let Some(pool) = state.db_pool.as_ref() else {
        return Ok(default_catalog());
    };

    let mut filters = Map::new();
    filters.insert("is_active".to_string(), Value::Bool(true));

    let rows = match list_rows(pool, "services", Some(&filters), 200, 0, "id", true).await {
        Ok(rows) => rows,
        Err(error) => {
            tracing::warn!(error = %error, "Catalog query failed, serving built-in defaults");
            return Ok(default_catalog());
        }
    };

    if rows.is_empty() {
        return Ok(default_catalog());
    }

    let services = rows
        .into_iter()
        .filter_map(|row| {
            // NULL columns arrive as JSON nulls; drop them so serde defaults apply.
            let row = match row {
                Value::Object(mut obj) => {
                    obj.retain(|_, value| !value.is_null());
                    Value::Object(obj)
                }
                other => other,
            };
            serde_json::from_value::<ServiceDefinition>(row).ok()
        })
        .collect::<Vec<_>>();

    if services.is_empty() {
        return Ok(default_catalog());
    }
    Ok(services)
}

#[cfg(test)]
mod tests {
    use super::{default_catalog, find_service};
    use crate::schemas::PricingType;

    #[test]
    fn seeded_catalog_has_unique_ids() {
        let catalog = default_catalog();
        let mut ids: Vec<&str> = catalog.iter().map(|service| service.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), catalog.len());
    }

    #[test]
    fn consultation_services_have_no_upfront_price() {
        for service in default_catalog() {
            if service.pricing_type == PricingType::Consultation {
                assert_eq!(service.unit_price, 0.0, "service {}", service.id);
            }
        }
    }

    #[test]
    fn finds_services_by_trimmed_id() {
        let catalog = default_catalog();
        assert!(find_service(&catalog, " mosque_carpets ").is_some());
        assert!(find_service(&catalog, "missing").is_none());
    }
}
