// libs/appointment-cell/src/services/cascade.rs
use reqwest::Method;
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{AppointmentError, CancelledBy, CascadeOutcome, PartyKind};
use crate::services::reservation::ReservationService;

/// Administrative suspension fan-out: every `upcoming` appointment of
/// the suspended party is cancelled through the same transition as a
/// self-cancel. Per-row storage failures are tolerated and reported,
/// not swallowed and not fatal to the rest of the set.
pub struct SuspensionCascadeService {
    supabase: SupabaseClient,
    reservations: ReservationService,
}

impl SuspensionCascadeService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            reservations: ReservationService::new(config),
        }
    }

    pub async fn on_suspend(
        &self,
        party: PartyKind,
        party_id: Uuid,
        auth_token: &str,
    ) -> Result<CascadeOutcome, AppointmentError> {
        info!("Running suspension cascade for {:?} {}", party, party_id);

        #[derive(Deserialize)]
        struct IdRow {
            id: Uuid,
        }

        let column = match party {
            PartyKind::Doctor => "doctor_id",
            PartyKind::Patient => "patient_id",
        };

        // Payment state is deliberately not filtered on: paid upcoming
        // appointments are cancelled too and surface downstream in the
        // reconciliation path.
        let path = format!(
            "/rest/v1/appointments?{}=eq.{}&status=eq.upcoming&select=id",
            column, party_id
        );
        let rows: Vec<IdRow> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let mut cancelled_count = 0u32;
        let mut failed_count = 0u32;

        for row in rows {
            match self
                .reservations
                .cancel(
                    row.id,
                    CancelledBy::System,
                    Some(format!("{:?} suspended", party).to_lowercase()),
                    auth_token,
                )
                .await
            {
                Ok(_) => cancelled_count += 1,
                Err(AppointmentError::InvalidTransition { current }) => {
                    // Raced a completion between enumeration and cancel;
                    // nothing to undo.
                    debug!(
                        "Skipping appointment {} already in status {}",
                        row.id, current
                    );
                }
                Err(e) => {
                    warn!("Cascade failed to cancel appointment {}: {}", row.id, e);
                    failed_count += 1;
                }
            }
        }

        info!(
            "Suspension cascade for {:?} {} cancelled {} appointments ({} failures)",
            party, party_id, cancelled_count, failed_count
        );

        Ok(CascadeOutcome {
            cancelled_count,
            failed_count,
        })
    }
}
