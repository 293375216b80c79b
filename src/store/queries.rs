//! Entity-specific accessors over the generic store: validated creators,
//! lookup scans, the relational "complete" views and collection statistics.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{AppError, AppResult};

use super::model::{
    CompleteTask, CompleteUser, Employee, Patient, Profile, ProfileKind, Role, Statistics,
    Supply, Task, User,
};
use super::Store;

fn decode<T: DeserializeOwned>(collection: &str, value: Value) -> AppResult<T> {
    serde_json::from_value(value)
        .map_err(|e| AppError::storage("malformed_record".into(), format!("{}: {}", collection, e)))
}

fn non_empty_str<'a>(fields: &'a Map<String, Value>, key: &str) -> AppResult<&'a str> {
    match fields.get(key).and_then(Value::as_str) {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(AppError::validation(
            "invalid_field".into(),
            format!("{} must be a non-empty string", key),
        )),
    }
}

/// Required-field gate for the entity creators. Null counts as missing.
fn require_fields(fields: &Map<String, Value>, required: &[&str]) -> AppResult<()> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|k| matches!(fields.get(*k), None | Some(Value::Null)))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::validation(
            "missing_field".into(),
            format!("missing required field(s): {}", missing.join(", ")),
        ))
    }
}

impl Store {
    pub fn create_role(&self, mut fields: Map<String, Value>) -> AppResult<Role> {
        require_fields(&fields, &["nombre"])?;
        fields.entry("permisos".to_string()).or_insert_with(|| Value::Array(Vec::new()));
        let record = self.create("roles", fields)?;
        decode("roles", record)
    }

    pub fn create_user(&self, fields: Map<String, Value>) -> AppResult<User> {
        require_fields(&fields, &["usuario", "password", "rolId", "perfilId"])?;
        let usuario = non_empty_str(&fields, "usuario")?.to_string();
        if self.get_user_by_username(&usuario).is_ok() {
            return Err(AppError::validation(
                "duplicate_field".into(),
                format!("usuario '{}' already exists", usuario),
            ));
        }
        let record = self.create("usuarios", fields)?;
        decode("usuarios", record)
    }

    pub fn create_employee(&self, fields: Map<String, Value>) -> AppResult<Employee> {
        require_fields(&fields, &["nombre", "cargo"])?;
        let record = self.create("empleados", fields)?;
        decode("empleados", record)
    }

    pub fn create_patient(&self, mut fields: Map<String, Value>) -> AppResult<Patient> {
        require_fields(&fields, &["nombre", "cedula"])?;
        let cedula = non_empty_str(&fields, "cedula")?.to_string();
        if self.get_patient_by_national_id(&cedula).is_ok() {
            return Err(AppError::validation(
                "duplicate_field".into(),
                format!("cedula '{}' already exists", cedula),
            ));
        }
        fields.entry("historial".to_string()).or_insert_with(|| Value::String(String::new()));
        let record = self.create("pacientes", fields)?;
        decode("pacientes", record)
    }

    pub fn create_task(&self, fields: Map<String, Value>) -> AppResult<Task> {
        require_fields(&fields, &["descripcion", "empleadoId", "estado", "fecha"])?;
        let record = self.create("tareas", fields)?;
        decode("tareas", record)
    }

    pub fn create_supply(&self, fields: Map<String, Value>) -> AppResult<Supply> {
        require_fields(&fields, &["nombre", "stock", "unidad"])?;
        let record = self.create("insumos", fields)?;
        decode("insumos", record)
    }

    /// A profile must reference the record its kind names, and only that one.
    pub fn create_profile(&self, fields: Map<String, Value>) -> AppResult<Profile> {
        require_fields(&fields, &["tipo"])?;
        let tipo = fields.get("tipo").and_then(Value::as_str).unwrap_or_default();
        let (required, forbidden) = match tipo {
            "empleado" => ("empleadoId", "pacienteId"),
            "paciente" => ("pacienteId", "empleadoId"),
            other => {
                return Err(AppError::validation(
                    "invalid_field".into(),
                    format!("tipo must be 'empleado' or 'paciente', found '{}'", other),
                ))
            }
        };
        if matches!(fields.get(required), None | Some(Value::Null)) {
            return Err(AppError::validation(
                "missing_field".into(),
                format!("perfil of tipo '{}' requires {}", tipo, required),
            ));
        }
        if !matches!(fields.get(forbidden), None | Some(Value::Null)) {
            return Err(AppError::validation(
                "invalid_field".into(),
                format!("perfil of tipo '{}' must not set {}", tipo, forbidden),
            ));
        }
        let record = self.create("perfiles", fields)?;
        decode("perfiles", record)
    }

    /// Linear scan by unique username.
    pub fn get_user_by_username(&self, usuario: &str) -> AppResult<User> {
        let record = self
            .get_all("usuarios")?
            .into_iter()
            .find(|r| r.get("usuario").and_then(Value::as_str) == Some(usuario))
            .ok_or_else(|| {
                AppError::not_found("user_not_found".into(), format!("no user '{}'", usuario))
            })?;
        decode("usuarios", record)
    }

    /// Linear scan by unique national identifier.
    pub fn get_patient_by_national_id(&self, cedula: &str) -> AppResult<Patient> {
        let record = self
            .get_all("pacientes")?
            .into_iter()
            .find(|r| r.get("cedula").and_then(Value::as_str) == Some(cedula))
            .ok_or_else(|| {
                AppError::not_found("patient_not_found".into(), format!("no patient with cedula '{}'", cedula))
            })?;
        decode("pacientes", record)
    }

    pub fn get_tasks_by_employee(&self, empleado_id: i64) -> AppResult<Vec<Task>> {
        self.filter_tasks(|t| t.empleado_id == empleado_id)
    }

    pub fn get_tasks_by_patient(&self, paciente_id: i64) -> AppResult<Vec<Task>> {
        self.filter_tasks(|t| t.paciente_id == Some(paciente_id))
    }

    pub fn get_tasks_by_status(&self, estado: &str) -> AppResult<Vec<Task>> {
        self.filter_tasks(|t| t.estado == estado)
    }

    fn filter_tasks(&self, keep: impl Fn(&Task) -> bool) -> AppResult<Vec<Task>> {
        let mut out = Vec::new();
        for record in self.get_all("tareas")? {
            let task: Task = decode("tareas", record)?;
            if keep(&task) {
                out.push(task);
            }
        }
        Ok(out)
    }

    /// Resolve User -> Role -> Profile -> (Employee | Patient). Every link in
    /// this chain is mandatory; a dangling reference fails with `NotFound`.
    pub fn get_complete_user(&self, id: i64) -> AppResult<CompleteUser> {
        let user: User = decode("usuarios", self.get_by_id("usuarios", id)?)?;
        let rol: Role = decode("roles", self.get_by_id("roles", user.rol_id)?)?;
        let perfil: Profile = decode("perfiles", self.get_by_id("perfiles", user.perfil_id)?)?;
        let (empleado, paciente) = match perfil.tipo {
            ProfileKind::Empleado => {
                let empleado_id = perfil.empleado_id.ok_or_else(|| {
                    AppError::not_found(
                        "dangling_reference".into(),
                        format!("perfil {} of tipo 'empleado' has no empleadoId", perfil.id),
                    )
                })?;
                let empleado: Employee = decode("empleados", self.get_by_id("empleados", empleado_id)?)?;
                (Some(empleado), None)
            }
            ProfileKind::Paciente => {
                let paciente_id = perfil.paciente_id.ok_or_else(|| {
                    AppError::not_found(
                        "dangling_reference".into(),
                        format!("perfil {} of tipo 'paciente' has no pacienteId", perfil.id),
                    )
                })?;
                let paciente: Patient = decode("pacientes", self.get_by_id("pacientes", paciente_id)?)?;
                (None, Some(paciente))
            }
        };
        Ok(CompleteUser {
            id: user.id,
            usuario: user.usuario,
            rol,
            perfil,
            empleado,
            paciente,
        })
    }

    /// Every task joined with its employee and optional patient. Unlike the
    /// user chain, these joins are best-effort: a dangling link degrades to
    /// an absent field instead of failing the composition.
    pub fn get_complete_tasks(&self) -> AppResult<Vec<CompleteTask>> {
        let mut out = Vec::new();
        for record in self.get_all("tareas")? {
            let task: Task = decode("tareas", record)?;
            let empleado = self
                .get_by_id("empleados", task.empleado_id)
                .ok()
                .map(|r| decode::<Employee>("empleados", r))
                .transpose()?;
            let paciente = match task.paciente_id {
                Some(pid) => self
                    .get_by_id("pacientes", pid)
                    .ok()
                    .map(|r| decode::<Patient>("pacientes", r))
                    .transpose()?,
                None => None,
            };
            out.push(CompleteTask {
                id: task.id,
                descripcion: task.descripcion,
                estado: task.estado,
                fecha: task.fecha,
                empleado,
                paciente,
            });
        }
        Ok(out)
    }

    /// Counts per collection plus derived task-status and low-stock counts.
    pub fn get_statistics(&self) -> AppResult<Statistics> {
        let threshold = self.low_stock_threshold();
        let tareas = self.get_all("tareas")?;
        let insumos = self.get_all("insumos")?;
        let count_estado = |estado: &str| {
            tareas
                .iter()
                .filter(|t| t.get("estado").and_then(Value::as_str) == Some(estado))
                .count()
        };
        let insumos_bajo_stock = insumos
            .iter()
            .filter(|s| {
                s.get("stock")
                    .and_then(Value::as_f64)
                    .map(|stock| stock < threshold)
                    .unwrap_or(false)
            })
            .count();
        Ok(Statistics {
            roles: self.get_all("roles")?.len(),
            usuarios: self.get_all("usuarios")?.len(),
            perfiles: self.get_all("perfiles")?.len(),
            empleados: self.get_all("empleados")?.len(),
            pacientes: self.get_all("pacientes")?.len(),
            tareas: tareas.len(),
            insumos: insumos.len(),
            tareas_pendientes: count_estado("pending"),
            tareas_completadas: count_estado("completed"),
            insumos_bajo_stock,
        })
    }
}
