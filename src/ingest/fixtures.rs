/// Test fixtures: representative JSON payloads from the pegelalarm list API.
///
/// Trimmed to the fields the service reads. Response shape:
///   status.code                 - "200" on success (sometimes a number)
///   payload.stations[]
///     .stationName, .country, .water, .region
///     .situation                - -10..50, 100 = unknown
///     .trend                    - -10 / 0 / 10, 100 = unknown
///     .latitude, .longitude, .altitudeM
///     .data[]
///       .type                   - "height in cm", "flow in m3/s", ...
///       .value
///       .sourceDate, .requestDate - "DD.MM.YYYYTHH:MM:SS+zzzz"

/// Korneuburg at warning level (30), Hainburg at regional flood (40).
#[cfg(test)]
pub(crate) fn fixture_warning_and_alert_json() -> &'static str {
    r#"{
      "status": { "code": "200" },
      "payload": {
        "stations": [
          {
            "stationName": "Korneuburg",
            "country": "Österreich",
            "water": "Donau",
            "region": "Niederösterreich",
            "situation": 30,
            "trend": 10,
            "latitude": 48.3456,
            "longitude": 16.3311,
            "altitudeM": 159.0,
            "data": [
              { "type": "flow in m3/s", "value": 4120.0,
                "sourceDate": "01.02.2020T09:45:00+0100", "requestDate": "01.02.2020T10:00:00+0100" },
              { "type": "height in cm", "value": 512.0,
                "sourceDate": "01.02.2020T09:45:00+0100", "requestDate": "01.02.2020T10:00:00+0100" }
            ]
          },
          {
            "stationName": "Hainburg",
            "country": "Österreich",
            "water": "Donau",
            "region": "Niederösterreich",
            "situation": 40,
            "trend": 0,
            "latitude": 48.1503,
            "longitude": 16.9417,
            "altitudeM": 137.0,
            "data": [
              { "type": "height in cm", "value": 640.0,
                "sourceDate": "01.02.2020 10:00", "requestDate": "01.02.2020 10:05" }
            ]
          }
        ]
      }
    }"#
}

/// Numeric status code, one station with no measurements and no codes.
#[cfg(test)]
pub(crate) fn fixture_numeric_status_json() -> &'static str {
    r#"{
      "status": { "code": 200 },
      "payload": {
        "stations": [
          { "stationName": "Schärding", "water": "Inn" }
        ]
      }
    }"#
}

/// qStationName=Salzburg matches fuzzily on the server side.
#[cfg(test)]
pub(crate) fn fixture_fuzzy_name_match_json() -> &'static str {
    r#"{
      "status": { "code": "200" },
      "payload": {
        "stations": [
          { "stationName": "Salzburg", "water": "Salzach", "situation": 10, "trend": -10, "data": [] },
          { "stationName": "Salzburg Nonntal", "water": "Salzach", "situation": 10, "trend": 0, "data": [] },
          { "stationName": "Salzburgring", "water": "Fuschler Ache", "situation": 20, "trend": 0, "data": [] }
        ]
      }
    }"#
}

/// Well-formed envelope reporting an API-side failure.
#[cfg(test)]
pub(crate) fn fixture_api_error_json() -> &'static str {
    r#"{ "status": { "code": "500", "message": "internal error" }, "payload": { "stations": [] } }"#
}
