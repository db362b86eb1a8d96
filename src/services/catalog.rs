use std::collections::HashSet;
use std::path::Path;

use tracing::info;

use crate::models::mission::{InspectionJob, Listing};

/// Built-in listings used when no catalog file is configured.
pub fn seed_listings() -> Vec<Listing> {
    let seed = [
        ("1", "Toyota Corolla 2021", "DHK-1234", "Gulshan 2", "1.2 km", "25 min", 450),
        ("2", "Honda Civic 2018", "DHK-5678", "Banani", "0.8 km", "35 min", 600),
        ("3", "Nissan X-Trail 2023", "DHK-9012", "Uttara", "4.5 km", "45 min", 800),
    ];

    seed.into_iter()
        .map(|(id, model, plate, location, distance, eta, reward)| Listing {
            id: id.to_string(),
            car_model: model.to_string(),
            license_plate: plate.to_string(),
            location: location.to_string(),
            distance: distance.to_string(),
            estimated_time: eta.to_string(),
            reward,
        })
        .collect()
}

/// Read a JSON array of listings from disk.
pub fn load_listings(path: &Path) -> Result<Vec<Listing>, CatalogError> {
    let raw = std::fs::read_to_string(path)?;
    let listings: Vec<Listing> = serde_json::from_str(&raw)?;
    info!(path = %path.display(), count = listings.len(), "Loaded mission catalog");
    Ok(listings)
}

/// Turn listings into available jobs. Ids must be unique.
pub fn into_jobs(listings: Vec<Listing>) -> Result<Vec<InspectionJob>, CatalogError> {
    let mut seen = HashSet::new();
    listings
        .into_iter()
        .map(|listing| {
            if !seen.insert(listing.id.clone()) {
                return Err(CatalogError::DuplicateId(listing.id));
            }
            Ok(InspectionJob::available(listing))
        })
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Duplicate mission id in catalog: {0}")]
    DuplicateId(String),
}
