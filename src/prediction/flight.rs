use crate::error::ResolveError;
use crate::prediction::airports::{AirportDirectory, AirportId};
use crate::prediction::model::{DelayPrediction, FlightModels, FlightPrediction, ModelInput};
use crate::resolver::cascade::TierResolver;
use crate::stations::locate_station::haversine_km;
use crate::time::error::LocalizeError;
use crate::time::localizer::validate_time_format;
use crate::types::query::Query;
use bon::Builder;
use chrono::{Datelike, NaiveDate, Timelike};
use log::debug;
use tokio_util::sync::CancellationToken;

/// A scheduled flight to score.
#[derive(Debug, Clone, PartialEq, Builder)]
pub struct FlightRequest {
    #[builder(into)]
    pub airline: String,
    pub origin_airport: AirportId,
    pub destination_airport: AirportId,
    /// Local calendar date of the flight.
    pub date: NaiveDate,
    /// Local wall-clock departure at the origin, `HH:MM`.
    #[builder(into)]
    pub departure_time: String,
    /// Local wall-clock arrival at the destination, `HH:MM`.
    #[builder(into)]
    pub arrival_time: String,
}

pub(crate) async fn predict_flight(
    resolver: &TierResolver,
    airports: &AirportDirectory,
    request: &FlightRequest,
    models: &FlightModels,
    cancel: &CancellationToken,
) -> Result<FlightPrediction, ResolveError> {
    for time in [&request.departure_time, &request.arrival_time] {
        if !validate_time_format(time) {
            return Err(LocalizeError::InvalidTimeFormat(time.clone()).into());
        }
    }

    let origin = airports
        .get(request.origin_airport)
        .ok_or(ResolveError::UnknownAirport(request.origin_airport))?;
    let destination = airports
        .get(request.destination_airport)
        .ok_or(ResolveError::UnknownAirport(request.destination_airport))?;

    let localizer = resolver.localizer();
    let departure_utc = localizer.to_utc(
        &request.departure_time,
        request.date,
        origin.location.0,
        origin.location.1,
    )?;
    let arrival_utc = localizer.to_utc(
        &request.arrival_time,
        request.date,
        destination.location.0,
        destination.location.1,
    )?;
    let distance_km = haversine_km(origin.location, destination.location);

    let query = Query::builder()
        .latitude(origin.location.0)
        .longitude(origin.location.1)
        .time(departure_utc)
        .origin_state(origin.state.clone())
        .origin_city(origin.city.clone())
        .build();
    let resolution = resolver.resolve(&query, cancel).await?;

    let input = ModelInput {
        day_of_week: departure_utc.weekday().num_days_from_monday(),
        airline: request.airline.clone(),
        origin: origin.id,
        destination: destination.id,
        distance_km,
        dep_hour: departure_utc.hour(),
        arr_hour: arrival_utc.hour(),
        dep_month: departure_utc.month(),
        weather: resolution.features,
    };
    debug!(
        "Scoring {} {} -> {} ({:.0} km) with {} weather",
        input.airline,
        input.origin,
        input.destination,
        distance_km,
        input.weather.source_tag()
    );

    let delays = DelayPrediction::from(models.delay.predict(&input));
    let cancelled = models.cancel.predict(&input);

    Ok(FlightPrediction {
        departure_utc,
        arrival_utc,
        input,
        delays,
        cancelled,
        weather_tiers: resolution.tiers,
    })
}
