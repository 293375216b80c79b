//! Typed views over the stored records. Field names map onto the persisted
//! wire format (`usuario`, `rolId`, `empleadoId`, ...); the Rust side keeps
//! snake_case identifiers via serde renames.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Immutable authorization reference: a named, ordered set of permissions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Role {
    pub id: i64,
    pub nombre: String,
    #[serde(default)]
    pub permisos: Vec<String>,
}

/// Login identity. `password` on the wire always holds the PHC hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub usuario: String,
    #[serde(rename = "password")]
    pub password_hash: String,
    #[serde(rename = "rolId")]
    pub rol_id: i64,
    #[serde(rename = "perfilId")]
    pub perfil_id: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    Empleado,
    Paciente,
}

/// Links a user to the employee or patient it represents; exactly one of
/// the two references is populated, determined by `tipo`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    pub tipo: ProfileKind,
    #[serde(rename = "empleadoId", default, skip_serializing_if = "Option::is_none")]
    pub empleado_id: Option<i64>,
    #[serde(rename = "pacienteId", default, skip_serializing_if = "Option::is_none")]
    pub paciente_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub id: i64,
    pub nombre: String,
    pub cargo: String,
    /// Free-form extra attributes preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    pub nombre: String,
    pub cedula: String,
    #[serde(default)]
    pub historial: String,
}

/// `estado` is an opaque caller-defined string; statistics single out
/// "pending" and "completed".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub descripcion: String,
    #[serde(rename = "empleadoId")]
    pub empleado_id: i64,
    #[serde(rename = "pacienteId", default, skip_serializing_if = "Option::is_none")]
    pub paciente_id: Option<i64>,
    pub estado: String,
    pub fecha: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supply {
    pub id: i64,
    pub nombre: String,
    pub stock: f64,
    pub unidad: String,
}

/// Derived, non-persisted composition of a user with its role, profile and
/// the linked employee or patient.
#[derive(Debug, Clone, Serialize)]
pub struct CompleteUser {
    pub id: i64,
    pub usuario: String,
    pub rol: Role,
    pub perfil: Profile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empleado: Option<Employee>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paciente: Option<Patient>,
}

/// A task joined with its employee and optional patient. Dangling links
/// degrade to `None` rather than failing the whole composition.
#[derive(Debug, Clone, Serialize)]
pub struct CompleteTask {
    pub id: i64,
    pub descripcion: String,
    pub estado: String,
    pub fecha: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empleado: Option<Employee>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paciente: Option<Patient>,
}

/// Per-collection record counts plus the derived task and stock counts.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Statistics {
    pub roles: usize,
    pub usuarios: usize,
    pub perfiles: usize,
    pub empleados: usize,
    pub pacientes: usize,
    pub tareas: usize,
    pub insumos: usize,
    #[serde(rename = "tareasPendientes")]
    pub tareas_pendientes: usize,
    #[serde(rename = "tareasCompletadas")]
    pub tareas_completadas: usize,
    #[serde(rename = "insumosBajoStock")]
    pub insumos_bajo_stock: usize,
}
