// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON bodies exchanged with the backend and their domain conversions.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use fieldsync_core::types::{
    Client, Coordinates, LoginGrant, Priority, Recommendation, RecommendationKind, RefreshGrant,
    Role, RoutePlan, User,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginRequest<'a> {
    pub id: &'a str,
    pub password: &'a str,
    pub remember_me: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserDto {
    pub id: String,
    pub nombre: String,
    pub rol: Role,
}

impl From<UserDto> for User {
    fn from(dto: UserDto) -> Self {
        User {
            id: dto.id,
            display_name: dto.nombre,
            role: dto.rol,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginResponse {
    pub token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub user: UserDto,
}

impl From<LoginResponse> for LoginGrant {
    fn from(body: LoginResponse) -> Self {
        LoginGrant {
            access_token: SecretString::from(body.token),
            refresh_token: SecretString::from(body.refresh_token),
            expires_in_secs: body.expires_in,
            user: body.user.into(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// The backend keeps the refresh token unless it rotates it.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefreshResponse {
    pub token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl From<RefreshResponse> for RefreshGrant {
    fn from(body: RefreshResponse) -> Self {
        RefreshGrant {
            access_token: SecretString::from(body.token),
            expires_in_secs: body.expires_in,
            refresh_token: body.refresh_token.map(SecretString::from),
        }
    }
}

/// Standard error body: `{error, message, details?, retryAfter?}`.
///
/// FastAPI wraps `HTTPException` details in `{"detail": {...}}`; both
/// shapes are accepted.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub retry_after: Option<u64>,
    #[serde(default)]
    pub detail: Option<Box<ApiErrorBody>>,
}

impl ApiErrorBody {
    pub fn parse(body: &str) -> Self {
        let parsed: Self = serde_json::from_str(body).unwrap_or_default();
        match parsed.detail {
            Some(inner) if parsed.error.is_none() && parsed.message.is_none() => *inner,
            _ => parsed,
        }
    }

    /// Human-readable summary, falling back to the raw body.
    pub fn describe(&self, raw: &str) -> String {
        match (&self.error, &self.message) {
            (Some(code), Some(message)) => format!("{code}: {message}"),
            (None, Some(message)) => message.clone(),
            (Some(code), None) => code.clone(),
            (None, None) if raw.is_empty() => "no response body".to_string(),
            (None, None) => raw.chars().take(200).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ClienteDto {
    id: String,
    codigo: String,
    nombre: String,
    #[serde(default)]
    direccion: Option<String>,
    #[serde(default)]
    coordenadas: Option<Coordinates>,
    segmento: String,
    #[serde(rename = "razonVisita")]
    razon_visita: String,
    prioridad: Priority,
}

impl From<ClienteDto> for Client {
    fn from(dto: ClienteDto) -> Self {
        Client {
            id: dto.id,
            code: dto.codigo,
            name: dto.nombre,
            address: dto.direccion,
            coordinates: dto.coordenadas,
            segment: dto.segmento,
            visit_reason: dto.razon_visita,
            priority: dto.prioridad,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RecomendacionDto {
    id: String,
    cliente_id: String,
    tipo: RecommendationKind,
    prioridad: Priority,
    titulo: String,
    descripcion: String,
    razon_visita: String,
    #[serde(default)]
    sku: Option<String>,
}

impl From<RecomendacionDto> for Recommendation {
    fn from(dto: RecomendacionDto) -> Self {
        Recommendation {
            id: dto.id,
            client_id: dto.cliente_id,
            kind: dto.tipo,
            priority: dto.prioridad,
            title: dto.titulo,
            description: dto.descripcion,
            visit_reason: dto.razon_visita,
            sku: dto.sku,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PlanDeRutaDto {
    id: String,
    fecha: String,
    asesor_id: String,
    clientes: Vec<ClienteDto>,
    recomendaciones: Vec<RecomendacionDto>,
}

impl From<PlanDeRutaDto> for RoutePlan {
    fn from(dto: PlanDeRutaDto) -> Self {
        RoutePlan {
            id: dto.id,
            date: dto.fecha,
            advisor_id: dto.asesor_id,
            clients: dto.clientes.into_iter().map(Client::from).collect(),
            recommendations: dto
                .recomendaciones
                .into_iter()
                .map(Recommendation::from)
                .collect(),
        }
    }
}
