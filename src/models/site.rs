//! Fixed contact and location details for the business site.
//!
//! These values are boundary constants the rest of the site renders
//! verbatim; they live here rather than in configuration because they are
//! part of the site's identity, not deployment parameters.

use serde::Serialize;

pub const CONTACT_PHONE: &str = "+917770099299";
pub const CONTACT_EMAIL: &str = "nirgunwashers@gmail.com";
pub const LOCATION_LAT: f64 = 18.6476;
pub const LOCATION_LNG: f64 = 73.7724;

/// Contact block served to the site frontend.
#[derive(Serialize, Clone, Debug)]
pub struct ContactInfo {
    pub phone: &'static str,
    pub email: &'static str,
    pub latitude: f64,
    pub longitude: f64,
}

impl ContactInfo {
    pub fn current() -> Self {
        Self {
            phone: CONTACT_PHONE,
            email: CONTACT_EMAIL,
            latitude: LOCATION_LAT,
            longitude: LOCATION_LNG,
        }
    }
}
