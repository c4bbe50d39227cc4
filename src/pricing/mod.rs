use crate::error::AppError;
use crate::geo::haversine_km;
use crate::models::order::FuelType;
use crate::models::pump::{FuelPump, GeoPoint};

/// Maps an origin/destination pair to a delivery fee. Implemented locally
/// from road distance; swappable for a maps-provider client.
pub trait FareEstimator: Send + Sync {
    fn estimate(&self, origin: &GeoPoint, destination: &GeoPoint) -> Result<f64, AppError>;
}

/// Maps a fuel type to its current unit price at a given pump.
pub trait PriceLookup: Send + Sync {
    fn unit_price(&self, pump: &FuelPump, fuel_type: FuelType) -> Result<f64, AppError>;
}

pub struct DistanceFareEstimator {
    base_fare: f64,
    fare_per_km: f64,
}

impl DistanceFareEstimator {
    pub fn new(base_fare: f64, fare_per_km: f64) -> Self {
        Self {
            base_fare,
            fare_per_km,
        }
    }
}

impl FareEstimator for DistanceFareEstimator {
    fn estimate(&self, origin: &GeoPoint, destination: &GeoPoint) -> Result<f64, AppError> {
        if !origin.lat.is_finite()
            || !origin.lng.is_finite()
            || !destination.lat.is_finite()
            || !destination.lng.is_finite()
        {
            return Err(AppError::Validation(
                "coordinates must be finite numbers".to_string(),
            ));
        }

        let distance_km = haversine_km(origin, destination);
        Ok(self.base_fare + self.fare_per_km * distance_km)
    }
}

/// Reads the pump's posted price table.
pub struct PostedPriceLookup;

impl PriceLookup for PostedPriceLookup {
    fn unit_price(&self, pump: &FuelPump, fuel_type: FuelType) -> Result<f64, AppError> {
        pump.prices.get(&fuel_type).copied().ok_or_else(|| {
            AppError::Validation(format!(
                "pump {} does not carry fuel type {fuel_type}",
                pump.name
            ))
        })
    }
}
