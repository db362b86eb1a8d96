//! Sample missions and image payloads shared by the integration tests

#![allow(dead_code)]

use auditgig::models::mission::Listing;

/// Smallest byte strings `image::guess_format` recognises.
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
pub const JPEG_BYTES: &[u8] = b"\xFF\xD8\xFF\xE0\0\x10JFIF\0";

/// Not an image at all.
pub const TEXT_BYTES: &[u8] = b"definitely not a photo";

/// A two-mission catalog with round rewards.
pub fn test_listings() -> Vec<Listing> {
    vec![
        Listing {
            id: "gig-1".to_string(),
            car_model: "Toyota Axio 2019".to_string(),
            license_plate: "DHK-1111".to_string(),
            location: "Dhanmondi".to_string(),
            distance: "2.0 km".to_string(),
            estimated_time: "30 min".to_string(),
            reward: 500,
        },
        Listing {
            id: "gig-2".to_string(),
            car_model: "Suzuki Swift 2020".to_string(),
            license_plate: "DHK-2222".to_string(),
            location: "Mirpur".to_string(),
            distance: "3.1 km".to_string(),
            estimated_time: "40 min".to_string(),
            reward: 700,
        },
    ]
}
